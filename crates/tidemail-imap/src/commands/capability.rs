//! CAPABILITY and ENABLE.

use std::collections::HashSet;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec::{Argument, Value};
use crate::connection::{ExecOptions, ImapConnection};
use crate::types::Capabilities;
use crate::Result;

impl<S> ImapConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the capability set, querying the server only when the cache
    /// is cold or a capability update is expected. Back-to-back calls are
    /// otherwise wire-free and return identical maps.
    pub async fn capability(&mut self) -> Result<Capabilities> {
        if !self.capabilities.is_empty() && !self.expect_capability_update {
            return Ok(self.capabilities.clone());
        }
        self.exec(
            "CAPABILITY",
            Vec::new(),
            ExecOptions::collecting(&["CAPABILITY"]),
        )
        .await?;
        // The router replaced the map from the untagged response.
        self.expect_capability_update = false;
        Ok(self.capabilities.clone())
    }

    /// Enables extensions via ENABLE (RFC 5161). Unsupported requests are
    /// ignored by the server; the returned set is what actually got
    /// enabled, which is also recorded on the connection.
    pub async fn enable(&mut self, extensions: &[&str]) -> Result<HashSet<String>> {
        self.require_authenticated()?;
        if extensions.is_empty() || !self.capabilities().has("ENABLE") {
            return Ok(HashSet::new());
        }

        let args = extensions
            .iter()
            .map(|ext| Argument::Atom(ext.to_uppercase()))
            .collect();
        let result = self
            .exec("ENABLE", args, ExecOptions::collecting(&["ENABLED"]))
            .await?;

        let mut newly_enabled = HashSet::new();
        for resp in result.collected_named("ENABLED") {
            for token in resp.attributes.iter().filter_map(Value::as_str) {
                newly_enabled.insert(token.to_uppercase());
            }
        }
        self.enabled.extend(newly_enabled.iter().cloned());
        Ok(newly_enabled)
    }
}
