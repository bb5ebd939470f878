//! The DHCPv6 message module.

pub mod constants;
pub mod duid;
pub mod message_type;
pub mod options;

mod deserializer;
mod serializer;
mod validator;

use std::fmt;

pub use self::{
    duid::Duid,
    message_type::MessageType,
    options::{
        ExcludedPrefix, IaAddress, IaNa, IaPd, IaPrefix, IaTa, OptionCode, Options, Status,
        StatusCode,
    },
    validator::Error as ValidationError,
};

/// DHCPv6 message.
///
/// The header is a single message type octet followed by a 24 bit
/// transaction identifier. Everything else is carried in options.
pub struct Message {
    pub message_type: MessageType,
    pub transaction_id: u32,
    pub options: Options,
}

/// Prints an option with `Debug`.
macro_rules! dbg_opt (
    ($f:expr, $options:expr, $field:ident, $code:expr) => (
        if let Some(ref v) = $options.$field {
            writeln!($f, "[{:03}] {:027}| {:?}", $code as u16, stringify!($field), v)?;
        }
    );
);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::OptionCode::*;

        writeln!(f)?;
        writeln!(f, "{}HEADER{}", "_".repeat(30), "_".repeat(39))?;
        writeln!(f, "{:32} | {}", "Message type", self.message_type)?;
        writeln!(f, "{:32} | {:#08x}", "Transaction ID", self.transaction_id)?;

        writeln!(f, "{}OPTIONS{}", "_".repeat(30), "_".repeat(38))?;
        dbg_opt!(f, self.options, client_id, ClientId);
        dbg_opt!(f, self.options, server_id, ServerId);
        for ia in self.options.ia_na.iter() {
            writeln!(f, "[{:03}] {:027}| {:?}", IaNa as u16, "ia_na", ia)?;
        }
        for ia in self.options.ia_ta.iter() {
            writeln!(f, "[{:03}] {:027}| {:?}", IaTa as u16, "ia_ta", ia)?;
        }
        dbg_opt!(f, self.options, option_request, OptionRequest);
        dbg_opt!(f, self.options, preference, Preference);
        dbg_opt!(f, self.options, elapsed_time, ElapsedTime);
        dbg_opt!(f, self.options, unicast, Unicast);
        dbg_opt!(f, self.options, status, StatusCode);
        if self.options.rapid_commit {
            writeln!(f, "[{:03}] {:027}| present", RapidCommit as u16, "rapid_commit")?;
        }
        dbg_opt!(f, self.options, dns_servers, DnsServers);
        dbg_opt!(f, self.options, domain_list, DomainList);
        for ia in self.options.ia_pd.iter() {
            writeln!(f, "[{:03}] {:027}| {:?}", IaPd as u16, "ia_pd", ia)?;
        }
        dbg_opt!(
            f,
            self.options,
            information_refresh_time,
            InformationRefreshTime
        );
        dbg_opt!(f, self.options, sol_max_rt, SolMaxRt);
        dbg_opt!(f, self.options, inf_max_rt, InfMaxRt);

        writeln!(f, "{}", "_".repeat(75))?;
        Ok(())
    }
}
