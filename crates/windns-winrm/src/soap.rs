//! WS-Management shell messages
//!
//! Builds the five SOAP requests of a remote-shell run (create, command,
//! receive, signal, delete) and parses the replies.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use windns_core::{Error, Result};

const NS_SOAP: &str = "http://www.w3.org/2003/05/soap-envelope";
const NS_ADDRESSING: &str = "http://schemas.xmlsoap.org/ws/2004/08/addressing";
const NS_WSMAN: &str = "http://schemas.dmtf.org/wbem/wsman/1/wsman.xsd";
const NS_WSMAN_MS: &str = "http://schemas.microsoft.com/wbem/wsman/1/wsman.xsd";
const NS_SHELL: &str = "http://schemas.microsoft.com/wbem/wsman/1/windows/shell";

const ADDRESS_ANONYMOUS: &str = "http://schemas.xmlsoap.org/ws/2004/08/addressing/role/anonymous";
const RESOURCE_URI_CMD: &str = "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/cmd";

pub const ACTION_CREATE: &str = "http://schemas.xmlsoap.org/ws/2004/09/transfer/Create";
pub const ACTION_DELETE: &str = "http://schemas.xmlsoap.org/ws/2004/09/transfer/Delete";
pub const ACTION_COMMAND: &str = "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/Command";
pub const ACTION_RECEIVE: &str = "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/Receive";
pub const ACTION_SIGNAL: &str = "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/Signal";

const SIGNAL_TERMINATE: &str =
    "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/signal/terminate";
const STATE_DONE_SUFFIX: &str = "/CommandState/Done";

/// WS-Management fault code for an expired Receive long-poll
const WSMAN_OPERATION_TIMEOUT: &str = "2150858793";

const MAX_ENVELOPE_SIZE: u32 = 153_600;

/// Longest command line Windows will start
pub const MAX_COMMAND_LINE: usize = 32_000;

/// Encode a PowerShell script for `-EncodedCommand` (base64 of UTF-16LE)
pub fn encode_powershell(script: &str) -> String {
    let utf16: Vec<u8> = script.encode_utf16().flat_map(u16::to_le_bytes).collect();
    STANDARD.encode(utf16)
}

/// Request builder bound to one endpoint
#[derive(Debug, Clone)]
pub struct Messages {
    endpoint: String,
    operation_timeout_secs: u64,
}

impl Messages {
    pub fn new(endpoint: impl Into<String>, operation_timeout_secs: u64) -> Self {
        Self {
            endpoint: endpoint.into(),
            operation_timeout_secs,
        }
    }

    pub fn create_shell(&self) -> String {
        self.envelope(
            ACTION_CREATE,
            None,
            &[("WINRS_NOPROFILE", "FALSE"), ("WINRS_CODEPAGE", "65001")],
            "<rsp:Shell><rsp:InputStreams>stdin</rsp:InputStreams><rsp:OutputStreams>stdout stderr</rsp:OutputStreams></rsp:Shell>",
        )
    }

    /// Start `powershell.exe -EncodedCommand <encoded>`
    pub fn command(&self, shell_id: &str, encoded: &str) -> String {
        let mut body = String::from("<rsp:CommandLine><rsp:Command>powershell.exe</rsp:Command>");
        for arg in ["-NoProfile", "-NonInteractive", "-EncodedCommand", encoded] {
            body.push_str("<rsp:Arguments>");
            body.push_str(&escape(arg));
            body.push_str("</rsp:Arguments>");
        }
        body.push_str("</rsp:CommandLine>");

        self.envelope(
            ACTION_COMMAND,
            Some(shell_id),
            &[
                ("WINRS_CONSOLEMODE_STDIN", "TRUE"),
                ("WINRS_SKIP_CMD_SHELL", "TRUE"),
            ],
            &body,
        )
    }

    pub fn receive(&self, shell_id: &str, command_id: &str) -> String {
        self.envelope(
            ACTION_RECEIVE,
            Some(shell_id),
            &[],
            &format!(
                r#"<rsp:Receive><rsp:DesiredStream CommandId="{}">stdout stderr</rsp:DesiredStream></rsp:Receive>"#,
                escape(command_id)
            ),
        )
    }

    pub fn terminate(&self, shell_id: &str, command_id: &str) -> String {
        self.envelope(
            ACTION_SIGNAL,
            Some(shell_id),
            &[],
            &format!(
                r#"<rsp:Signal CommandId="{}"><rsp:Code>{}</rsp:Code></rsp:Signal>"#,
                escape(command_id),
                SIGNAL_TERMINATE
            ),
        )
    }

    pub fn delete_shell(&self, shell_id: &str) -> String {
        self.envelope(ACTION_DELETE, Some(shell_id), &[], "")
    }

    fn envelope(
        &self,
        action: &str,
        shell_id: Option<&str>,
        options: &[(&str, &str)],
        body: &str,
    ) -> String {
        let mut header = String::new();
        header.push_str(&format!(
            r#"<a:To>{}</a:To><a:ReplyTo><a:Address s:mustUnderstand="true">{}</a:Address></a:ReplyTo>"#,
            escape(self.endpoint.as_str()),
            ADDRESS_ANONYMOUS
        ));
        header.push_str(&format!(
            r#"<w:MaxEnvelopeSize s:mustUnderstand="true">{}</w:MaxEnvelopeSize>"#,
            MAX_ENVELOPE_SIZE
        ));
        header.push_str(&format!(
            "<a:MessageID>uuid:{}</a:MessageID>",
            uuid::Uuid::new_v4().to_string().to_uppercase()
        ));
        header.push_str(r#"<w:Locale xml:lang="en-US" s:mustUnderstand="false"/>"#);
        header.push_str(r#"<p:DataLocale xml:lang="en-US" s:mustUnderstand="false"/>"#);
        header.push_str(&format!(
            "<w:OperationTimeout>PT{}S</w:OperationTimeout>",
            self.operation_timeout_secs
        ));
        header.push_str(&format!(
            r#"<w:ResourceURI s:mustUnderstand="true">{}</w:ResourceURI>"#,
            RESOURCE_URI_CMD
        ));
        header.push_str(&format!(
            r#"<a:Action s:mustUnderstand="true">{}</a:Action>"#,
            action
        ));
        if let Some(id) = shell_id {
            header.push_str(&format!(
                r#"<w:SelectorSet><w:Selector Name="ShellId">{}</w:Selector></w:SelectorSet>"#,
                escape(id)
            ));
        }
        if !options.is_empty() {
            header.push_str("<w:OptionSet>");
            for (name, value) in options {
                header.push_str(&format!(r#"<w:Option Name="{}">{}</w:Option>"#, name, value));
            }
            header.push_str("</w:OptionSet>");
        }

        format!(
            r#"<?xml version="1.0" encoding="utf-8"?><s:Envelope xmlns:s="{}" xmlns:a="{}" xmlns:w="{}" xmlns:p="{}" xmlns:rsp="{}"><s:Header>{}</s:Header><s:Body>{}</s:Body></s:Envelope>"#,
            NS_SOAP, NS_ADDRESSING, NS_WSMAN, NS_WSMAN_MS, NS_SHELL, header, body
        )
    }
}

/// A SOAP fault
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fault {
    /// `s:Reason/s:Text`, or the WS-Management message when absent
    pub reason: String,
    /// `s:Subcode/s:Value` entries
    pub subcodes: Vec<String>,
    /// `WSManFault Code` attribute
    pub wsman_code: Option<String>,
}

impl Fault {
    /// Whether this fault only means a Receive long-poll expired
    pub fn is_operation_timeout(&self) -> bool {
        self.wsman_code.as_deref() == Some(WSMAN_OPERATION_TIMEOUT)
            || self.subcodes.iter().any(|c| c.ends_with("TimedOut"))
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.wsman_code {
            Some(code) => write!(f, "{} (code {})", self.reason, code),
            None => f.write_str(&self.reason),
        }
    }
}

/// Fields of interest in any shell reply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub shell_id: Option<String>,
    pub command_id: Option<String>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub done: bool,
    pub exit_code: Option<i32>,
    pub fault: Option<Fault>,
}

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
    Other,
}

/// Parse a WS-Management reply
pub fn parse_reply(xml: &str) -> Result<Reply> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut reply = Reply::default();
    let mut path: Vec<String> = Vec::new();
    let mut stream = Stream::Other;
    let mut shell_selector = false;
    let mut fault_message = String::new();

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => {
                let name = local_name(&e);
                open(&e, &name, &mut reply, &mut stream, &mut shell_selector)?;
                path.push(name);
            }
            Event::Empty(e) => {
                let name = local_name(&e);
                open(&e, &name, &mut reply, &mut stream, &mut shell_selector)?;
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(xml_error)?;
                let current = path.last().map(String::as_str).unwrap_or_default();
                let parent = path
                    .len()
                    .checked_sub(2)
                    .and_then(|i| path.get(i))
                    .map(String::as_str)
                    .unwrap_or_default();

                match current {
                    "ShellId" => reply.shell_id = Some(text.into_owned()),
                    "Selector" if shell_selector => reply.shell_id = Some(text.into_owned()),
                    "CommandId" => reply.command_id = Some(text.into_owned()),
                    "Stream" => {
                        let bytes = STANDARD
                            .decode(text.as_bytes())
                            .map_err(|e| Error::protocol(format!("invalid stream data: {}", e)))?;
                        match stream {
                            Stream::Stdout => reply.stdout.extend_from_slice(&bytes),
                            Stream::Stderr => reply.stderr.extend_from_slice(&bytes),
                            Stream::Other => {}
                        }
                    }
                    "ExitCode" => {
                        let code = text.trim().parse::<i64>().map_err(|_| {
                            Error::protocol(format!("invalid exit code: {}", text))
                        })?;
                        // Windows exit codes are DWORDs
                        reply.exit_code = Some(code as i32);
                    }
                    "Text" if parent == "Reason" => {
                        if let Some(fault) = reply.fault.as_mut() {
                            fault.reason.push_str(&text);
                        }
                    }
                    "Value" if parent == "Subcode" => {
                        if let Some(fault) = reply.fault.as_mut() {
                            fault.subcodes.push(text.into_owned());
                        }
                    }
                    "Message" => fault_message.push_str(&text),
                    _ => {}
                }
            }
            Event::End(_) => {
                path.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(fault) = reply.fault.as_mut() {
        if fault.reason.is_empty() {
            fault.reason = fault_message.trim().to_string();
        }
    }

    Ok(reply)
}

fn open(
    e: &BytesStart<'_>,
    name: &str,
    reply: &mut Reply,
    stream: &mut Stream,
    shell_selector: &mut bool,
) -> Result<()> {
    match name {
        "Fault" => {
            reply.fault.get_or_insert_with(Fault::default);
        }
        "WSManFault" => {
            let code = attribute(e, "Code")?;
            reply.fault.get_or_insert_with(Fault::default).wsman_code = code;
        }
        "Selector" => {
            *shell_selector = attribute(e, "Name")?.as_deref() == Some("ShellId");
        }
        "Stream" => {
            *stream = match attribute(e, "Name")?.as_deref() {
                Some("stdout") => Stream::Stdout,
                Some("stderr") => Stream::Stderr,
                _ => Stream::Other,
            };
        }
        "CommandState" => {
            if attribute(e, "State")?.is_some_and(|s| s.ends_with(STATE_DONE_SUFFIX)) {
                reply.done = true;
            }
        }
        _ => {}
    }
    Ok(())
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(|e| Error::protocol(format!("malformed reply: {}", e)))?;
        if attr.key.local_name().as_ref() == name.as_bytes() {
            let value = attr.unescape_value().map_err(xml_error)?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn xml_error(e: quick_xml::Error) -> Error {
    Error::protocol(format!("malformed reply: {}", e))
}
