//! Client configuration renderers for an aggregated node list.

use std::collections::HashSet;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{TimeZone, Utc};
use serde::Serialize;
use serde_json::json;

use crate::error::RenderError;
use crate::links::ClientFormat;
use crate::models::SubscriptionInfo;
use crate::nodes::AggregatedNode;

const HEALTH_CHECK_URL: &str = "http://www.gstatic.com/generate_204";
const PROXY_GROUP: &str = "Proxy";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedConfig {
    pub content: String,
    pub content_type: &'static str,
    pub filename: String,
}

pub fn render(
    format: ClientFormat,
    nodes: &[AggregatedNode],
    subscription: &SubscriptionInfo,
    now: i64,
) -> Result<RenderedConfig, RenderError> {
    let content = match format {
        ClientFormat::Universal => {
            STANDARD.encode(share_links(nodes, &ALL_SHARE_PROTOCOLS).join("\n"))
        }
        ClientFormat::V2ray => STANDARD.encode(share_links(nodes, &["vmess", "vless"]).join("\n")),
        ClientFormat::Clash => clash_config(nodes, subscription, now)?,
        ClientFormat::Shadowrocket => shadowrocket_config(nodes, now),
        ClientFormat::Quantumult => quantumult_config(nodes, now),
        ClientFormat::Surge => surge_config(nodes, now),
    };

    Ok(RenderedConfig {
        content,
        content_type: format.content_type(),
        filename: format!(
            "{}-{}.{}",
            filename_fragment(&subscription.plan_name),
            format,
            format.file_extension()
        ),
    })
}

const ALL_SHARE_PROTOCOLS: [&str; 4] = ["ss", "vmess", "trojan", "vless"];

/// One share URI per node whose protocol is in `protocols` and whose credentials are complete.
pub fn share_links(nodes: &[AggregatedNode], protocols: &[&str]) -> Vec<String> {
    nodes
        .iter()
        .filter(|n| protocols.contains(&n.protocol.as_str()))
        .filter_map(|n| {
            let link = share_link(n);
            if link.is_none() {
                log::warn!("Node {} ({}) is missing credentials, skipped", n.id, n.protocol);
            }
            link
        })
        .collect()
}

fn share_link(node: &AggregatedNode) -> Option<String> {
    let name = node.display_name();
    let c = &node.credentials;
    let path = c.path.as_deref().unwrap_or("/");

    match node.protocol.as_str() {
        "ss" => {
            let userinfo = URL_SAFE_NO_PAD.encode(format!("{}:{}", c.method.as_deref()?, c.password.as_deref()?));
            Some(format!(
                "ss://{}@{}:{}#{}",
                userinfo,
                node.host,
                node.port,
                urlencoding::encode(&name)
            ))
        }
        "vmess" => {
            let config = json!({
                "v": "2",
                "ps": name,
                "add": node.host,
                "port": node.port.to_string(),
                "id": c.uuid.as_deref()?,
                "aid": "0",
                "net": "ws",
                "type": "none",
                "host": node.host,
                "path": path,
                "tls": "tls",
            });
            Some(format!("vmess://{}", STANDARD.encode(config.to_string())))
        }
        "vless" => Some(format!(
            "vless://{}@{}:{}?encryption=none&security=tls&sni={}&type=ws&host={}&path={}#{}",
            c.uuid.as_deref()?,
            node.host,
            node.port,
            node.host,
            node.host,
            urlencoding::encode(path),
            urlencoding::encode(&name)
        )),
        "trojan" => Some(format!(
            "trojan://{}@{}:{}?sni={}#{}",
            urlencoding::encode(c.password.as_deref()?),
            node.host,
            node.port,
            node.host,
            urlencoding::encode(&name)
        )),
        _ => None,
    }
}

#[derive(Serialize)]
struct ClashConfig<'a> {
    port: u16,
    #[serde(rename = "socks-port")]
    socks_port: u16,
    #[serde(rename = "allow-lan")]
    allow_lan: bool,
    mode: &'a str,
    #[serde(rename = "log-level")]
    log_level: &'a str,
    proxies: Vec<ClashProxy>,
    #[serde(rename = "proxy-groups")]
    proxy_groups: Vec<ClashGroup>,
    rules: Vec<String>,
}

#[derive(Serialize)]
struct ClashProxy {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    server: String,
    port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    cipher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    uuid: Option<String>,
    #[serde(rename = "alterId", skip_serializing_if = "Option::is_none")]
    alter_id: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tls: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    servername: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sni: Option<String>,
    #[serde(rename = "skip-cert-verify", skip_serializing_if = "Option::is_none")]
    skip_cert_verify: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    network: Option<String>,
    #[serde(rename = "ws-opts", skip_serializing_if = "Option::is_none")]
    ws_opts: Option<WsOpts>,
}

#[derive(Serialize)]
struct WsOpts {
    path: String,
    headers: WsHeaders,
}

#[derive(Serialize)]
struct WsHeaders {
    #[serde(rename = "Host")]
    host: String,
}

#[derive(Serialize)]
struct ClashGroup {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    proxies: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    interval: Option<u32>,
}

impl ClashGroup {
    fn select(name: &str, proxies: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            kind: "select".to_string(),
            proxies,
            url: None,
            interval: None,
        }
    }

    fn probing(name: &str, kind: &str, proxies: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            proxies,
            url: Some(HEALTH_CHECK_URL.to_string()),
            interval: Some(300),
        }
    }
}

fn clash_proxy(node: &AggregatedNode) -> Option<ClashProxy> {
    let c = &node.credentials;
    let mut proxy = ClashProxy {
        name: node.display_name(),
        kind: node.protocol.clone(),
        server: node.host.clone(),
        port: node.port,
        cipher: None,
        password: None,
        uuid: None,
        alter_id: None,
        tls: None,
        servername: None,
        sni: None,
        skip_cert_verify: None,
        network: None,
        ws_opts: None,
    };
    let ws = || WsOpts {
        path: c.path.clone().unwrap_or_else(|| "/".to_string()),
        headers: WsHeaders {
            host: node.host.clone(),
        },
    };

    match node.protocol.as_str() {
        "ss" => {
            proxy.cipher = Some(c.method.clone()?);
            proxy.password = Some(c.password.clone()?);
        }
        "vmess" => {
            proxy.uuid = Some(c.uuid.clone()?);
            proxy.alter_id = Some(0);
            proxy.cipher = Some("auto".to_string());
            proxy.tls = Some(true);
            proxy.network = Some("ws".to_string());
            proxy.ws_opts = Some(ws());
        }
        "vless" => {
            proxy.uuid = Some(c.uuid.clone()?);
            proxy.tls = Some(true);
            proxy.servername = Some(node.host.clone());
            proxy.network = Some("ws".to_string());
            proxy.ws_opts = Some(ws());
        }
        "trojan" => {
            proxy.password = Some(c.password.clone()?);
            proxy.sni = Some(node.host.clone());
            proxy.skip_cert_verify = Some(false);
        }
        _ => return None,
    }
    Some(proxy)
}

fn clash_config(
    nodes: &[AggregatedNode],
    subscription: &SubscriptionInfo,
    now: i64,
) -> Result<String, RenderError> {
    let mut unique = UniqueNames::default();
    let proxies: Vec<ClashProxy> = nodes
        .iter()
        .filter_map(|n| {
            let mut proxy = clash_proxy(n)?;
            proxy.name = unique.peek(n);
            unique.claim(&proxy.name);
            Some(proxy)
        })
        .collect();
    let names: Vec<String> = proxies.iter().map(|p| p.name.clone()).collect();

    // Clash rejects probing groups without members.
    let mut proxy_groups = Vec::new();
    let mut selector = Vec::new();
    if !names.is_empty() {
        for (name, kind) in [
            ("Auto", "url-test"),
            ("Fallback", "fallback"),
            ("LoadBalance", "load-balance"),
        ] {
            selector.push(name.to_string());
            proxy_groups.push(ClashGroup::probing(name, kind, names.clone()));
        }
    }
    selector.push("DIRECT".to_string());
    selector.extend(names.iter().cloned());
    proxy_groups.insert(0, ClashGroup::select(PROXY_GROUP, selector));

    let config = ClashConfig {
        port: 7890,
        socks_port: 7891,
        allow_lan: false,
        mode: "rule",
        log_level: "info",
        proxies,
        proxy_groups,
        rules: [
            "DOMAIN-SUFFIX,local,DIRECT",
            "IP-CIDR,127.0.0.0/8,DIRECT",
            "IP-CIDR,172.16.0.0/12,DIRECT",
            "IP-CIDR,192.168.0.0/16,DIRECT",
            "IP-CIDR,10.0.0.0/8,DIRECT",
            "IP-CIDR,100.64.0.0/10,DIRECT",
            "GEOIP,CN,DIRECT",
        ]
        .iter()
        .map(|r| r.to_string())
        .chain(std::iter::once(format!("MATCH,{PROXY_GROUP}")))
        .collect(),
    };

    let yaml = serde_yaml::to_string(&config).map_err(|e| RenderError::Serialize(e.to_string()))?;
    Ok(format!(
        "# {} - Clash\n# updated: {}\n# expires: {}\n\n{}",
        subscription.plan_name,
        ts_to_rfc3339(now),
        ts_to_rfc3339(subscription.end_date),
        yaml
    ))
}

fn shadowrocket_config(nodes: &[AggregatedNode], now: i64) -> String {
    let mut lines = vec![
        format!("# updated {}", ts_to_rfc3339(now)),
        String::new(),
        "[General]".to_string(),
        "bypass-system = true".to_string(),
        "skip-proxy = 192.168.0.0/16, 10.0.0.0/8, 172.16.0.0/12, localhost, *.local, captive.apple.com".to_string(),
        "dns-server = system".to_string(),
        "ipv6 = true".to_string(),
        String::new(),
        "[Proxy]".to_string(),
    ];
    let names = proxy_section(&mut lines, nodes, |n, name| {
        let c = &n.credentials;
        match n.protocol.as_str() {
            "ss" => Some(format!(
                "{} = ss, {}, {}, {}, {}",
                name,
                n.host,
                n.port,
                c.method.as_deref()?,
                c.password.as_deref()?
            )),
            "vmess" | "vless" => Some(format!(
                "{} = {}, {}, {}, {}, {}, over-tls=true, tls-host={}, path={}",
                name,
                n.protocol,
                n.host,
                n.port,
                c.method.as_deref().unwrap_or("auto"),
                c.uuid.as_deref()?,
                n.host,
                c.path.as_deref().unwrap_or("/")
            )),
            "trojan" => Some(format!(
                "{} = trojan, {}, {}, {}",
                name,
                n.host,
                n.port,
                c.password.as_deref()?
            )),
            _ => None,
        }
    });
    lines.extend(proxy_group_footer(&names, "FINAL"));
    lines.join("\n")
}

fn quantumult_config(nodes: &[AggregatedNode], now: i64) -> String {
    let mut lines = vec![
        format!("# updated {}", ts_to_rfc3339(now)),
        String::new(),
        "[server_local]".to_string(),
    ];
    let names = proxy_section(&mut lines, nodes, |n, name| {
        let c = &n.credentials;
        match n.protocol.as_str() {
            "ss" => Some(format!(
                "shadowsocks={}:{}, method={}, password={}, tag={}",
                n.host,
                n.port,
                c.method.as_deref()?,
                c.password.as_deref()?,
                name
            )),
            "vmess" => Some(format!(
                "vmess={}:{}, method={}, password={}, obfs=wss, obfs-host={}, obfs-uri={}, tls-verification=true, tag={}",
                n.host,
                n.port,
                c.method.as_deref().unwrap_or("auto"),
                c.uuid.as_deref()?,
                n.host,
                c.path.as_deref().unwrap_or("/"),
                name
            )),
            "vless" => Some(format!(
                "vless={}:{}, method=none, password={}, obfs=wss, obfs-host={}, obfs-uri={}, tls-verification=true, tag={}",
                n.host,
                n.port,
                c.uuid.as_deref()?,
                n.host,
                c.path.as_deref().unwrap_or("/"),
                name
            )),
            "trojan" => Some(format!(
                "trojan={}:{}, password={}, over-tls=true, tls-verification=true, tag={}",
                n.host,
                n.port,
                c.password.as_deref()?,
                name
            )),
            _ => None,
        }
    });

    lines.push(String::new());
    lines.push("[policy]".to_string());
    lines.push(group_line(&format!("static={PROXY_GROUP}"), ", ", &names));
    lines.push(String::new());
    lines.push("[filter_local]".to_string());
    lines.push("geoip, cn, direct".to_string());
    lines.push(format!("final, {PROXY_GROUP}"));
    lines.join("\n")
}

fn surge_config(nodes: &[AggregatedNode], now: i64) -> String {
    let mut lines = vec![
        format!("# updated {}", ts_to_rfc3339(now)),
        String::new(),
        "[General]".to_string(),
        "loglevel = notify".to_string(),
        "bypass-system = true".to_string(),
        "skip-proxy = 127.0.0.1, 192.168.0.0/16, 10.0.0.0/8, 172.16.0.0/12, 100.64.0.0/10, localhost, *.local".to_string(),
        "dns-server = system".to_string(),
        String::new(),
        "[Proxy]".to_string(),
    ];
    let names = proxy_section(&mut lines, nodes, |n, name| {
        let c = &n.credentials;
        match n.protocol.as_str() {
            "ss" => Some(format!(
                "{} = ss, {}, {}, encrypt-method={}, password={}",
                name,
                n.host,
                n.port,
                c.method.as_deref()?,
                c.password.as_deref()?
            )),
            "vmess" => Some(format!(
                "{} = vmess, {}, {}, username={}, tls=true, ws=true, ws-path={}",
                name,
                n.host,
                n.port,
                c.uuid.as_deref()?,
                c.path.as_deref().unwrap_or("/")
            )),
            "trojan" => Some(format!(
                "{} = trojan, {}, {}, password={}",
                name,
                n.host,
                n.port,
                c.password.as_deref()?
            )),
            _ => None,
        }
    });
    lines.extend(proxy_group_footer(&names, "FINAL"));
    lines.join("\n")
}

/// Appends one proxy line per renderable node and returns the names those lines define.
///
/// Nodes `line` cannot render become a comment and are left out of the returned names,
/// so groups only ever reference defined proxies.
fn proxy_section<F>(lines: &mut Vec<String>, nodes: &[AggregatedNode], line: F) -> Vec<String>
where
    F: Fn(&AggregatedNode, &str) -> Option<String>,
{
    let mut names = UniqueNames::default();
    let mut defined = Vec::new();
    for n in nodes {
        let name = names.peek(n);
        match line(n, &name) {
            Some(l) => {
                lines.push(l);
                names.claim(&name);
                defined.push(name);
            }
            None => lines.push(unsupported(n)),
        }
    }
    defined
}

fn group_line(head: &str, separator: &str, names: &[String]) -> String {
    if names.is_empty() {
        format!("{head}{separator}DIRECT")
    } else {
        format!("{head}{separator}{}", names.join(", "))
    }
}

fn proxy_group_footer(names: &[String], final_rule: &str) -> Vec<String> {
    vec![
        String::new(),
        "[Proxy Group]".to_string(),
        group_line(&format!("{PROXY_GROUP} = select"), ", ", names),
        String::new(),
        "[Rule]".to_string(),
        "GEOIP,CN,DIRECT".to_string(),
        format!("{final_rule},{PROXY_GROUP}"),
    ]
}

/// Client-visible proxy names; a repeated display name is suffixed with the node id.
#[derive(Default)]
struct UniqueNames {
    taken: HashSet<String>,
}

impl UniqueNames {
    fn peek(&self, node: &AggregatedNode) -> String {
        let name = node.display_name();
        if self.taken.contains(&name) {
            format!("{} ({})", name, node.id)
        } else {
            name
        }
    }

    fn claim(&mut self, name: &str) {
        self.taken.insert(name.to_string());
    }
}

fn unsupported(node: &AggregatedNode) -> String {
    if matches!(node.protocol.as_str(), "ss" | "vmess" | "vless" | "trojan") {
        log::warn!("Node {} ({}) is missing credentials, skipped", node.id, node.protocol);
        format!("# Incomplete credentials: {}", node.id)
    } else {
        format!("# Unsupported protocol: {}", node.protocol)
    }
}

fn ts_to_rfc3339(ts: i64) -> String {
    Utc.timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}

/// Plan names end up in a `Content-Disposition` header.
fn filename_fragment(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.trim_matches('_').is_empty() {
        "subscription".to_string()
    } else {
        cleaned
    }
}
