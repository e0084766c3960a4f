//! Concrete checkers
//!
//! Each checker captures its target when built and implements [`Check`](crate::check::Check).
//! Transport failures (DNS, refused connections, timeouts, protocol and credential errors) are
//! turned into critical results inside the checker; nothing here returns an error to the caller.
//!
//! - [`PingCheck`]: ICMP echo round trip
//! - [`TcpPortCheck`]: TCP connect time
//! - [`HttpCheck`]: HTTP GET validated by an [`HttpExpectation`]
//! - [`SnmpGetCheck`] / [`SnmpTableThresholdCheck`]: SNMPv2c scalar and table threshold
//! - [`RabbitMqQueueCheck`]: queue depth against a maximum
//! - [`MysqlCheck`]: MySQL round trip time
//! - [`GenericCheck`]: any metric function paired with a state function

pub mod generic;
pub mod http;
pub mod mysql;
pub mod ping;
pub mod rabbitmq;
pub mod snmp;
pub mod tcp;

pub use generic::{GenericCheck, below};
pub use http::{HttpCheck, HttpExpectation};
pub use mysql::MysqlCheck;
pub use ping::PingCheck;
pub use rabbitmq::RabbitMqQueueCheck;
pub use snmp::{SnmpCheckConf, SnmpGetCheck, SnmpTableThresholdCheck};
pub use tcp::TcpPortCheck;
