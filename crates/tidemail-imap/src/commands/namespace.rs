//! NAMESPACE (RFC 2342), with a LIST fallback for servers without it.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec::{Argument, Value, decode_path};
use crate::connection::{ExecOptions, ImapConnection};
use crate::types::{Namespace, Namespaces};
use crate::Result;

impl<S> ImapConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Discovers the server's namespaces and records them on the
    /// connection.
    ///
    /// Servers without NAMESPACE get a `LIST "" ""` probe, which yields the
    /// hierarchy delimiter; a single personal namespace is synthesized from
    /// it. The primary personal namespace is always present afterwards.
    pub async fn namespace(&mut self) -> Result<Namespaces> {
        self.require_authenticated()?;

        let mut namespaces = if self.capabilities().has("NAMESPACE") {
            let result = self
                .exec("NAMESPACE", Vec::new(), ExecOptions::collecting(&["NAMESPACE"]))
                .await?;
            result
                .collected_named("NAMESPACE")
                .next()
                .map(|resp| Namespaces {
                    personal: parse_group(resp.attributes.first()),
                    other: parse_group(resp.attributes.get(1)),
                    shared: parse_group(resp.attributes.get(2)),
                })
                .unwrap_or_default()
        } else {
            // The LIST "" "" form asks only for the hierarchy delimiter.
            let args = vec![
                Argument::String(String::new()),
                Argument::String(String::new()),
            ];
            let result = self
                .exec("LIST", args, ExecOptions::collecting(&["LIST"]))
                .await?;
            let delimiter = result
                .collected_named("LIST")
                .filter_map(|resp| resp.attributes.get(1))
                .find_map(|value| value.as_str().and_then(|s| s.chars().next()));
            Namespaces {
                personal: vec![Namespace {
                    prefix: String::new(),
                    delimiter: delimiter.or(Some('.')),
                }],
                other: Vec::new(),
                shared: Vec::new(),
            }
        };

        if namespaces.personal.is_empty() {
            namespaces.personal.push(Namespace {
                prefix: String::new(),
                delimiter: Some('.'),
            });
        }
        self.namespaces = namespaces.clone();
        Ok(namespaces)
    }
}

/// Parses one namespace group: NIL or `((prefix delimiter ...) ...)`.
fn parse_group(value: Option<&Value>) -> Vec<Namespace> {
    let Some(items) = value.and_then(Value::as_list) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_list)
        .filter_map(|pair| {
            let prefix = decode_path(pair.first()?.as_str()?);
            let delimiter = match pair.get(1) {
                Some(Value::Nil) | None => None,
                Some(value) => value.as_str().and_then(|s| s.chars().next()),
            };
            Some(Namespace { prefix, delimiter })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::codec::{ResponseLine, parse_line};

    #[test]
    fn parses_namespace_groups() {
        let ResponseLine::Untagged(resp) = parse_line(
            b"* NAMESPACE ((\"\" \"/\")) ((\"~\" \"/\")) NIL\r\n",
        )
        .unwrap() else {
            panic!("expected untagged");
        };
        let personal = parse_group(resp.attributes.first());
        assert_eq!(personal.len(), 1);
        assert_eq!(personal[0].prefix, "");
        assert_eq!(personal[0].delimiter, Some('/'));

        let other = parse_group(resp.attributes.get(1));
        assert_eq!(other[0].prefix, "~");

        let shared = parse_group(resp.attributes.get(2));
        assert!(shared.is_empty());
    }
}
