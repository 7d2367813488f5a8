//! Connection configuration.

use std::time::Duration;

use super::framed::DEFAULT_MAX_LITERAL;

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption (port 143). Not recommended outside tests.
    None,
    /// Start plaintext, upgrade with STARTTLS (port 143).
    StartTls,
    /// TLS from the first byte (port 993).
    #[default]
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None | Self::StartTls => 143,
            Self::Implicit => 993,
        }
    }
}

/// Authentication credentials.
#[derive(Clone)]
pub enum Credentials {
    /// Username and password (LOGIN or AUTHENTICATE PLAIN).
    Password {
        /// Account name.
        user: String,
        /// Password.
        pass: String,
    },
    /// OAuth 2.0 bearer token (AUTHENTICATE XOAUTH2).
    AccessToken {
        /// Account name.
        user: String,
        /// Bearer token.
        token: String,
    },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never leak secrets into logs.
        match self {
            Self::Password { user, .. } => f
                .debug_struct("Credentials::Password")
                .field("user", user)
                .finish_non_exhaustive(),
            Self::AccessToken { user, .. } => f
                .debug_struct("Credentials::AccessToken")
                .field("user", user)
                .finish_non_exhaustive(),
        }
    }
}

/// Caller-supplied special-use path hints, merged into LIST processing with
/// the highest priority.
#[derive(Debug, Clone, Default)]
pub struct SpecialUseHints {
    /// Path of the sent-mail folder.
    pub sent: Option<String>,
    /// Path of the junk folder.
    pub junk: Option<String>,
    /// Path of the trash folder.
    pub trash: Option<String>,
    /// Path of the drafts folder.
    pub drafts: Option<String>,
    /// Path of the archive folder.
    pub archive: Option<String>,
}

/// IMAP connection configuration.
#[derive(Debug, Clone)]
pub struct ImapConfig {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Credentials used by `login`.
    pub auth: Option<Credentials>,
    /// Key/value pairs sent in the ID command. A `date` key is normalized to
    /// an IMAP date-time; other values are collapsed to a single line.
    pub client_info: Vec<(String, String)>,
    /// Suppress literal8/BINARY even when the server advertises it.
    pub disable_binary: bool,
    /// Emit raw wire traffic as `Response` events.
    pub log_raw: bool,
    /// Special-use path hints.
    pub special_use_hints: SpecialUseHints,
    /// Connection/greeting timeout.
    pub connect_timeout: Duration,
    /// Default per-command timeout; `None` waits indefinitely.
    pub command_timeout: Option<Duration>,
    /// NOOP fallback interval when IDLE is unavailable.
    pub noop_interval: Duration,
    /// Cap on a single incoming literal.
    pub max_literal_size: usize,
}

impl ImapConfig {
    /// Creates a configuration with implicit TLS on port 993.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 993,
            security: Security::Implicit,
            auth: None,
            client_info: Vec::new(),
            disable_binary: false,
            log_raw: false,
            special_use_hints: SpecialUseHints::default(),
            connect_timeout: Duration::from_secs(30),
            command_timeout: None,
            noop_interval: Duration::from_secs(120),
            max_literal_size: DEFAULT_MAX_LITERAL,
        }
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ImapConfigBuilder {
        ImapConfigBuilder {
            config: Self::new(host),
            port_overridden: false,
        }
    }
}

/// Builder for [`ImapConfig`].
#[derive(Debug, Clone)]
pub struct ImapConfigBuilder {
    config: ImapConfig,
    port_overridden: bool,
}

impl ImapConfigBuilder {
    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self.port_overridden = true;
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.config.security = security;
        self
    }

    /// Sets password credentials.
    #[must_use]
    pub fn credentials(mut self, user: impl Into<String>, pass: impl Into<String>) -> Self {
        self.config.auth = Some(Credentials::Password {
            user: user.into(),
            pass: pass.into(),
        });
        self
    }

    /// Sets OAuth bearer-token credentials.
    #[must_use]
    pub fn access_token(mut self, user: impl Into<String>, token: impl Into<String>) -> Self {
        self.config.auth = Some(Credentials::AccessToken {
            user: user.into(),
            token: token.into(),
        });
        self
    }

    /// Adds an ID key/value pair.
    #[must_use]
    pub fn client_info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.client_info.push((key.into(), value.into()));
        self
    }

    /// Disables BINARY/literal8 negotiation.
    #[must_use]
    pub const fn disable_binary(mut self, disable: bool) -> Self {
        self.config.disable_binary = disable;
        self
    }

    /// Emits raw wire traffic as events.
    #[must_use]
    pub const fn log_raw(mut self, log_raw: bool) -> Self {
        self.config.log_raw = log_raw;
        self
    }

    /// Sets the special-use hints.
    #[must_use]
    pub fn special_use_hints(mut self, hints: SpecialUseHints) -> Self {
        self.config.special_use_hints = hints;
        self
    }

    /// Sets the connect/greeting timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Sets the default per-command timeout.
    #[must_use]
    pub const fn command_timeout(mut self, timeout: Duration) -> Self {
        self.config.command_timeout = Some(timeout);
        self
    }

    /// Sets the NOOP fallback interval.
    #[must_use]
    pub const fn noop_interval(mut self, interval: Duration) -> Self {
        self.config.noop_interval = interval;
        self
    }

    /// Builds the configuration, deriving the port from the security mode
    /// unless one was set explicitly.
    #[must_use]
    pub fn build(self) -> ImapConfig {
        let mut config = self.config;
        if !self.port_overridden {
            config.port = config.security.default_port();
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_derives_port_from_security() {
        let config = ImapConfig::builder("imap.example.com")
            .security(Security::StartTls)
            .build();
        assert_eq!(config.port, 143);

        let config = ImapConfig::builder("imap.example.com").build();
        assert_eq!(config.port, 993);
    }

    #[test]
    fn explicit_port_wins() {
        let config = ImapConfig::builder("localhost")
            .security(Security::None)
            .port(10_143)
            .build();
        assert_eq!(config.port, 10_143);
    }

    #[test]
    fn credentials_debug_hides_secrets() {
        let creds = Credentials::Password {
            user: "alice".into(),
            pass: "hunter2".into(),
        };
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
    }
}
