// # Command Payload Builder
//
// Renders a validated [`RecordCommand`] into the PowerShell script that runs
// on the remote host.
//
// ## Script contract
//
// Every script:
// 1. looks up the A records for name/zone on the DNS server
// 2. branches on the lookup (missing → 404 for read/update/delete, add proceeds)
// 3. performs its mutation, inside the same try block so any earlier failure
//    skips it
// 4. writes exactly one compressed JSON envelope `{code, detail, records}` to
//    standard output
//
// ## Substitution
//
// Templates carry `%%KEY%%` placeholders. String values are always emitted
// as PowerShell single-quoted literals via [`quote`]; numbers and booleans
// are emitted from typed values. Nothing is spliced in raw.

use super::options::RecordCommand;

const PRELUDE: &str = r#"$ErrorActionPreference = 'Stop'
$ProgressPreference = 'SilentlyContinue'

function Write-Envelope([int]$Code, [string]$Detail, [object[]]$Records = @()) {
    $res = @{
        code    = $Code
        detail  = $Detail
        records = @($Records)
    }
    Write-Output ($res | ConvertTo-Json -Compress -Depth 5)
}

function ConvertTo-RecordEntry($Record, [string]$Zone) {
    @{
        type = 'A'
        name = $Record.HostName
        zone = $Zone
        data = $Record.RecordData.IPv4Address.IPAddressToString
        ttl  = [int]$Record.TimeToLive.TotalSeconds
    }
}

$dnsServer = %%DNS_SERVER%%
$zoneName  = %%ZONE%%
$name      = %%NAME%%

try {
    Import-Module DnsServer

    $findArgs = @{
        Name         = $name
        ComputerName = $dnsServer
        ZoneName     = $zoneName
        RRType       = 'A'
    }

    $existing = @()
    try {
        $existing = @(Get-DnsServerResourceRecord @findArgs)
    } catch {
        if ($_.CategoryInfo.Category -ne 'ObjectNotFound') { throw }
    }
"#;

const EPILOGUE: &str = r#"} catch {
    Write-Envelope -Code 500 -Detail "$($_.Exception.Message)"
}
"#;

const READ_BODY: &str = r#"
    $address = %%ADDRESS%%

    if ($existing.Count -eq 0) {
        Write-Envelope -Code 404 -Detail 'record not found'
        return
    }

    $records = @($existing | Where-Object {
        [string]::IsNullOrEmpty($address) -or $_.RecordData.IPv4Address.IPAddressToString -eq $address
    } | ForEach-Object { ConvertTo-RecordEntry $_ $zoneName })

    Write-Envelope -Code 200 -Detail 'record found' -Records $records
"#;

const ADD_BODY: &str = r#"
    $address = %%ADDRESS%%

    $match = @($existing | Where-Object {
        $_.RecordData.IPv4Address.IPAddressToString -eq $address
    })
    if ($match.Count -gt 0) {
        Write-Envelope -Code 400 -Detail 'record already exists'
        return
    }

    $createArgs = @{
        A              = $true
        ZoneName       = $zoneName
        Name           = $name
        IPv4Address    = $address
        ComputerName   = $dnsServer
        AllowUpdateAny = %%ALLOW_UPDATE_ANY%%
        CreatePtr      = %%CREATE_PTR%%
        TimeToLive     = [System.TimeSpan]::FromSeconds(%%TTL%%)
        Confirm        = $false
    }
    Add-DnsServerResourceRecord @createArgs

    $created = @{
        type = 'A'
        name = $name
        zone = $zoneName
        data = $address
        ttl  = %%TTL%%
    }
    Write-Envelope -Code 200 -Detail 'record created' -Records @($created)
"#;

const UPDATE_BODY: &str = r#"
    $address    = %%ADDRESS%%
    $newAddress = %%NEW_ADDRESS%%
    $ttl        = %%TTL%%

    $record = $existing | Where-Object {
        $_.RecordData.IPv4Address.IPAddressToString -eq $address
    } | Select-Object -First 1
    if ($null -eq $record) {
        Write-Envelope -Code 404 -Detail 'record not found'
        return
    }

    $newRecord = $record.Clone()
    if ($ttl -gt 0) {
        $newRecord.TimeToLive = [System.TimeSpan]::FromSeconds($ttl)
    }
    if (-not [string]::IsNullOrEmpty($newAddress)) {
        $newRecord.RecordData.IPv4Address = [ipaddress]$newAddress
    }

    $updateArgs = @{
        NewInputObject = $newRecord
        OldInputObject = $record
        ComputerName   = $dnsServer
        ZoneName       = $zoneName
        Confirm        = $false
    }
    Set-DnsServerResourceRecord @updateArgs

    Write-Envelope -Code 200 -Detail 'record updated' -Records @(ConvertTo-RecordEntry $newRecord $zoneName)
"#;

const DELETE_BODY: &str = r#"
    $address = %%ADDRESS%%

    $records = @($existing | Where-Object {
        $_.RecordData.IPv4Address.IPAddressToString -eq $address
    })
    if ($records.Count -eq 0) {
        Write-Envelope -Code 404 -Detail 'record not found'
        return
    }

    $deleteArgs = @{
        ComputerName = $dnsServer
        ZoneName     = $zoneName
        Force        = $true
        Confirm      = $false
    }
    $records | Remove-DnsServerResourceRecord @deleteArgs

    $deleted = @($records | ForEach-Object { ConvertTo-RecordEntry $_ $zoneName })
    Write-Envelope -Code 200 -Detail 'record deleted' -Records $deleted
"#;

/// Renders record commands into PowerShell payloads
///
/// The builder is bound to the DNS server every command targets, which is
/// not necessarily the host the script runs on (see proxy hosts).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBuilder {
    dns_server: String,
}

impl CommandBuilder {
    /// Create a builder targeting `dns_server`
    pub fn new(dns_server: impl Into<String>) -> Self {
        Self {
            dns_server: dns_server.into(),
        }
    }

    /// The DNS server commands target
    pub fn dns_server(&self) -> &str {
        &self.dns_server
    }

    /// Render the script for `command`
    ///
    /// Deterministic: identical inputs produce identical text.
    pub fn render(&self, command: &RecordCommand) -> String {
        match command {
            RecordCommand::Read {
                name,
                zone,
                address,
            } => self.assemble(
                READ_BODY,
                name,
                zone,
                &[("ADDRESS", quote(address.as_deref().unwrap_or_default()))],
            ),
            RecordCommand::Add {
                name,
                zone,
                address,
                allow_update_any,
                create_ptr,
                ttl,
            } => self.assemble(
                ADD_BODY,
                name,
                zone,
                &[
                    ("ADDRESS", quote(address)),
                    ("ALLOW_UPDATE_ANY", flag(*allow_update_any)),
                    ("CREATE_PTR", flag(*create_ptr)),
                    ("TTL", ttl.to_string()),
                ],
            ),
            RecordCommand::Update {
                name,
                zone,
                address,
                new_address,
                ttl,
            } => self.assemble(
                UPDATE_BODY,
                name,
                zone,
                &[
                    ("ADDRESS", quote(address)),
                    ("NEW_ADDRESS", quote(new_address.as_deref().unwrap_or_default())),
                    ("TTL", ttl.unwrap_or(0).to_string()),
                ],
            ),
            RecordCommand::Delete {
                name,
                zone,
                address,
            } => self.assemble(DELETE_BODY, name, zone, &[("ADDRESS", quote(address))]),
        }
    }

    fn assemble(&self, body: &str, name: &str, zone: &str, values: &[(&str, String)]) -> String {
        let mut template = String::with_capacity(PRELUDE.len() + body.len() + EPILOGUE.len());
        template.push_str(PRELUDE);
        template.push_str(body);
        template.push_str(EPILOGUE);

        let mut all = vec![
            ("DNS_SERVER", quote(&self.dns_server)),
            ("ZONE", quote(zone)),
            ("NAME", quote(name)),
        ];
        all.extend(values.iter().map(|(k, v)| (*k, v.clone())));

        substitute(&template, &all)
    }
}

/// Replace every `%%KEY%%` in one pass, so substituted values are never
/// scanned for placeholders themselves.
fn substitute(template: &str, values: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len() + 128);
    let mut rest = template;

    while let Some(start) = rest.find("%%") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("%%") else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };

        let key = &after[..end];
        match values.iter().find(|(k, _)| *k == key) {
            Some((_, value)) => out.push_str(value),
            None => {
                debug_assert!(false, "no value for placeholder {}", key);
                out.push_str(&rest[start..start + end + 4]);
            }
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    out
}

fn flag(value: bool) -> String {
    if value { "$true" } else { "$false" }.to_string()
}

/// Quote `value` as a PowerShell single-quoted string literal
///
/// PowerShell treats the typographic single quotes (U+2018..U+201B) like `'`,
/// so every one of them is doubled. Inside single quotes nothing else is
/// interpreted: no `$` expansion, no backtick escapes.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        if matches!(c, '\'' | '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}') {
            out.push(c);
        }
        out.push(c);
    }
    out.push('\'');
    out
}
