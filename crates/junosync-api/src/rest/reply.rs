// RPC reply decoding
//
// Replies are scanned as a flat event stream rather than deserialized into
// a document model: the engine only needs diagnostics, a handful of leaf
// values, and the text payload of output elements. Multi-RPC requests come
// back as a multipart body, which the scanner tolerates because it never
// requires a single root element.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::Error;

/// Severity of an `<rpc-error>` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// One `<rpc-error>` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

/// Collect every `<rpc-error>` in a reply.
///
/// Entries without an explicit severity are treated as errors.
pub fn diagnostics(body: &str) -> Result<Vec<Diagnostic>, Error> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut out = Vec::new();
    let mut current: Option<(Option<Severity>, String)> = None;
    let mut field: Option<Vec<u8>> = None;

    loop {
        match reader.read_event().map_err(|e| malformed(&e, body))? {
            Event::Start(e) => {
                let name = e.local_name().as_ref().to_vec();
                if name == b"rpc-error" {
                    current = Some((None, String::new()));
                } else if current.is_some() {
                    field = Some(name);
                }
            }
            Event::Text(t) => {
                let (Some((severity, message)), Some(name)) = (current.as_mut(), field.as_deref())
                else {
                    continue;
                };
                let text = t.unescape().map_err(|e| malformed(&e, body))?;
                match name {
                    b"error-severity" => {
                        *severity = Some(if text.trim() == "warning" {
                            Severity::Warning
                        } else {
                            Severity::Error
                        });
                    }
                    b"error-message" => message.push_str(text.trim()),
                    _ => {}
                }
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"rpc-error" {
                    if let Some((severity, message)) = current.take() {
                        out.push(Diagnostic {
                            severity: severity.unwrap_or(Severity::Error),
                            message,
                        });
                    }
                }
                field = None;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(out)
}

/// Unescaped text content of the first element named `name`.
///
/// Returns `Some("")` for an empty element and `None` when absent.
pub fn element_text(body: &str, name: &str) -> Result<Option<String>, Error> {
    let mut reader = Reader::from_str(body);
    let mut text: Option<String> = None;

    loop {
        match reader.read_event().map_err(|e| malformed(&e, body))? {
            Event::Start(e) if e.local_name().as_ref() == name.as_bytes() => {
                text = Some(String::new());
            }
            Event::Empty(e) if e.local_name().as_ref() == name.as_bytes() => {
                return Ok(Some(String::new()));
            }
            Event::Text(t) => {
                if let Some(buf) = text.as_mut() {
                    buf.push_str(&t.unescape().map_err(|e| malformed(&e, body))?);
                }
            }
            Event::CData(c) => {
                if let Some(buf) = text.as_mut() {
                    buf.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::End(e) if e.local_name().as_ref() == name.as_bytes() => return Ok(text),
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

fn malformed(err: &dyn std::fmt::Display, body: &str) -> Error {
    Error::Deserialization {
        message: err.to_string(),
        body: body.to_owned(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn collects_errors_and_warnings() {
        let body = r#"<rpc-reply xmlns:junos="http://xml.juniper.net/junos/*/junos">
<rpc-error>
<error-severity>warning</error-severity>
<error-message>statement not found</error-message>
</rpc-error>
<rpc-error>
<error-type>protocol</error-type>
<error-severity>error</error-severity>
<error-message>
configuration database locked by:
  admin terminal p0 (pid 1234)
</error-message>
</rpc-error>
</rpc-reply>"#;
        let diags = diagnostics(body).unwrap();
        assert_eq!(diags.len(), 2);
        assert_eq!(diags[0].severity, Severity::Warning);
        assert_eq!(diags[0].message, "statement not found");
        assert_eq!(diags[1].severity, Severity::Error);
        assert!(diags[1].message.starts_with("configuration database locked by:"));
    }

    #[test]
    fn missing_severity_is_an_error() {
        let body = "<rpc-error><error-message>boom</error-message></rpc-error>";
        let diags = diagnostics(body).unwrap();
        assert_eq!(diags[0].severity, Severity::Error);
    }

    #[test]
    fn element_text_unescapes() {
        let body = "<rpc-reply><configuration-output>\nset description &quot;a &amp; b&quot;\n</configuration-output></rpc-reply>";
        let text = element_text(body, "configuration-output").unwrap().unwrap();
        assert_eq!(text.trim(), "set description \"a & b\"");
    }

    #[test]
    fn element_text_absent_and_empty() {
        assert_eq!(element_text("<ok/>", "output").unwrap(), None);
        assert_eq!(element_text("<output/>", "output").unwrap(), Some(String::new()));
    }

    #[test]
    fn tolerates_multipart_bodies() {
        let body = "--harqgehabymwiax\r\nContent-Type: application/xml; charset=utf-8\r\n\r\n<ok/>\r\n--harqgehabymwiax\r\nContent-Type: application/xml; charset=utf-8\r\n\r\n<rpc-error><error-severity>error</error-severity><error-message>commit failed</error-message></rpc-error>\r\n--harqgehabymwiax--";
        let diags = diagnostics(body).unwrap();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message, "commit failed");
    }
}
