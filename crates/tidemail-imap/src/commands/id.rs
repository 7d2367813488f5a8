//! ID exchange (RFC 2971).

use std::collections::HashMap;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec::{Argument, Value, format_datetime};
use crate::connection::{ExecOptions, ImapConnection};
use crate::Result;

impl<S> ImapConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Sends the configured client identification and records the server's
    /// answer (lowercased keys) on the connection.
    ///
    /// Returns `None` when the server does not advertise ID.
    pub async fn exchange_id(&mut self) -> Result<Option<HashMap<String, String>>> {
        if !self.capabilities().has("ID") {
            return Ok(None);
        }

        let client_info = self.config.client_info.clone();
        let args = if client_info.is_empty() {
            vec![Argument::Nil]
        } else {
            let mut pairs = Vec::with_capacity(client_info.len() * 2);
            for (key, value) in &client_info {
                pairs.push(Argument::String(key.clone()));
                pairs.push(Argument::String(normalize_id_value(key, value)));
            }
            vec![Argument::List(pairs)]
        };

        let result = self.exec("ID", args, ExecOptions::collecting(&["ID"])).await?;

        let mut info = HashMap::new();
        if let Some(resp) = result.collected_named("ID").next()
            && let Some(Value::List(items)) = resp.attributes.first()
        {
            let mut iter = items.iter();
            while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
                if let (Some(key), Some(value)) = (key.as_str(), value.as_str()) {
                    info.insert(key.to_lowercase(), value.to_string());
                }
            }
        }
        self.server_info.clone_from(&info);
        Ok(Some(info))
    }
}

/// ID values must be single-line; a `date` key is normalized to the IMAP
/// date-time form when it parses.
fn normalize_id_value(key: &str, value: &str) -> String {
    if key.eq_ignore_ascii_case("date")
        && let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(value)
    {
        return format_datetime(&parsed);
    }
    value
        .replace(['\r', '\n'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
