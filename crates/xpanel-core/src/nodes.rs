//! Merges the static server pool with plan-entitled EdgeTunnel group nodes.

use std::collections::{BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::InventoryError;
use crate::models::SubscriptionInfo;

/// Added to a grouped node's own sort order so the static pool always comes first.
pub const DYNAMIC_SORT_OFFSET: i32 = 1000;

const DEFAULT_GROUPED_PROTOCOL: &str = "vless";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCredentials {
    pub method: Option<String>,
    pub password: Option<String>,
    pub uuid: Option<String>,
    pub path: Option<String>,
}

/// A row of the administratively managed static server pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticServer {
    pub id: i64,
    pub name: String,
    pub host: String,
    pub port: i32,
    pub protocol: String,
    pub credentials: NodeCredentials,
    pub country: String,
    pub city: String,
    pub flag_emoji: String,
    pub is_active: bool,
    pub sort_order: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeGroup {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupedNode {
    pub id: i64,
    /// `None` for a node whose group was deleted
    pub group_id: Option<i64>,
    pub name: String,
    pub host: String,
    pub port: i32,
    pub protocol: String,
    pub credentials: NodeCredentials,
    pub country: String,
    pub city: String,
    pub flag_emoji: String,
    pub is_active: bool,
    pub sort_order: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source_type", rename_all = "snake_case")]
pub enum NodeSource {
    Static {
        server_id: i64,
    },
    Grouped {
        node_id: i64,
        group_id: i64,
        group_name: String,
    },
}

/// One entry of a subscription's node list, regardless of which inventory it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedNode {
    /// `server_<id>` or `edgetunnel_<id>`
    pub id: String,
    #[serde(flatten)]
    pub source: NodeSource,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub protocol: String,
    #[serde(flatten)]
    pub credentials: NodeCredentials,
    pub country: String,
    pub city: String,
    pub flag_emoji: String,
    pub sort_order: i32,
}

impl AggregatedNode {
    fn from_static(server: &StaticServer) -> Option<Self> {
        let port = valid_port(server.port, "server", server.id)?;
        Some(Self {
            id: format!("server_{}", server.id),
            source: NodeSource::Static {
                server_id: server.id,
            },
            name: server.name.clone(),
            host: server.host.clone(),
            port,
            protocol: server.protocol.clone(),
            credentials: server.credentials.clone(),
            country: server.country.clone(),
            city: server.city.clone(),
            flag_emoji: server.flag_emoji.clone(),
            sort_order: server.sort_order,
        })
    }

    fn from_grouped(node: &GroupedNode, group: &NodeGroup) -> Option<Self> {
        let port = valid_port(node.port, "edgetunnel node", node.id)?;
        let protocol = if node.protocol.trim().is_empty() {
            DEFAULT_GROUPED_PROTOCOL.to_string()
        } else {
            node.protocol.clone()
        };
        Some(Self {
            id: format!("edgetunnel_{}", node.id),
            source: NodeSource::Grouped {
                node_id: node.id,
                group_id: group.id,
                group_name: group.name.clone(),
            },
            name: format!("{} - {}", group.name, node.name),
            host: node.host.clone(),
            port,
            protocol,
            credentials: node.credentials.clone(),
            country: node.country.clone(),
            city: node.city.clone(),
            flag_emoji: node.flag_emoji.clone(),
            sort_order: DYNAMIC_SORT_OFFSET.saturating_add(node.sort_order),
        })
    }

    pub fn is_static(&self) -> bool {
        matches!(self.source, NodeSource::Static { .. })
    }

    /// Display name as shown by clients, prefixed with the flag when one is set.
    pub fn display_name(&self) -> String {
        if self.flag_emoji.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.flag_emoji, self.name)
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStats {
    pub static_count: usize,
    pub grouped_count: usize,
    pub total_count: usize,
}

impl NodeStats {
    pub fn of(nodes: &[AggregatedNode]) -> Self {
        let static_count = nodes.iter().filter(|n| n.is_static()).count();
        Self {
            static_count,
            grouped_count: nodes.len() - static_count,
            total_count: nodes.len(),
        }
    }
}

/// Read-only view over the static servers, node groups and the plan→group mapping.
#[async_trait]
pub trait NodeInventory: Send + Sync {
    async fn active_servers(&self) -> Result<Vec<StaticServer>, InventoryError>;

    async fn entitled_group_ids(&self, plan_id: i64) -> Result<Vec<i64>, InventoryError>;

    /// Groups with the given ids, active or not.
    async fn groups(&self, ids: &[i64]) -> Result<Vec<NodeGroup>, InventoryError>;

    async fn active_grouped_nodes(&self, group_ids: &[i64]) -> Result<Vec<GroupedNode>, InventoryError>;
}

/// Every node the subscription's plan entitles it to, in client display order.
pub async fn aggregate<I: NodeInventory + ?Sized>(
    inventory: &I,
    subscription: &SubscriptionInfo,
) -> Result<Vec<AggregatedNode>, InventoryError> {
    let servers = inventory.active_servers().await?;
    let entitled = inventory.entitled_group_ids(subscription.plan_id).await?;

    let (groups, grouped_nodes) = if entitled.is_empty() {
        (Vec::new(), Vec::new())
    } else {
        let groups = inventory.groups(&entitled).await?;
        let live: Vec<i64> = groups.iter().filter(|g| g.is_active).map(|g| g.id).collect();
        let nodes = if live.is_empty() {
            Vec::new()
        } else {
            inventory.active_grouped_nodes(&live).await?
        };
        (groups, nodes)
    };

    let nodes = merge_nodes(&servers, &groups, &grouped_nodes, &entitled);
    log::debug!(
        "Aggregated {} node(s) for subscription {} (plan {})",
        nodes.len(),
        subscription.id,
        subscription.plan_id
    );
    Ok(nodes)
}

/// Normalizes, filters, de-duplicates and orders both inventories.
///
/// A grouped node is kept only if its group exists, is active and is entitled;
/// the group flag wins over the node flag.
pub fn merge_nodes(
    servers: &[StaticServer],
    groups: &[NodeGroup],
    grouped_nodes: &[GroupedNode],
    entitled_group_ids: &[i64],
) -> Vec<AggregatedNode> {
    let entitled: BTreeSet<i64> = entitled_group_ids.iter().copied().collect();
    let live_groups: HashMap<i64, &NodeGroup> = groups
        .iter()
        .filter(|g| g.is_active && entitled.contains(&g.id))
        .map(|g| (g.id, g))
        .collect();

    let statics = servers
        .iter()
        .filter(|s| s.is_active)
        .filter_map(AggregatedNode::from_static);

    let grouped = grouped_nodes
        .iter()
        .filter(|n| n.is_active)
        .filter_map(|n| {
            let group = n.group_id.and_then(|id| live_groups.get(&id))?;
            AggregatedNode::from_grouped(n, group)
        });

    let mut seen = HashSet::new();
    let mut nodes: Vec<AggregatedNode> = statics
        .chain(grouped)
        .filter(|n| seen.insert(n.id.clone()))
        .collect();

    nodes.sort_by(|a, b| {
        a.sort_order
            .cmp(&b.sort_order)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    });
    nodes
}

fn valid_port(port: i32, kind: &str, id: i64) -> Option<u16> {
    match u16::try_from(port) {
        Ok(p) if p != 0 => Some(p),
        _ => {
            log::warn!("Skipping {} {} with invalid port {}", kind, id, port);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(id: i64, name: &str, sort_order: i32) -> StaticServer {
        StaticServer {
            id,
            name: name.to_string(),
            host: format!("s{id}.example.com"),
            port: 443,
            protocol: "trojan".to_string(),
            credentials: NodeCredentials {
                password: Some("pw".to_string()),
                ..Default::default()
            },
            country: "JP".to_string(),
            city: "Tokyo".to_string(),
            flag_emoji: String::new(),
            is_active: true,
            sort_order,
        }
    }

    fn group(id: i64, name: &str, is_active: bool) -> NodeGroup {
        NodeGroup {
            id,
            name: name.to_string(),
            is_active,
        }
    }

    fn node(id: i64, group_id: Option<i64>, name: &str) -> GroupedNode {
        GroupedNode {
            id,
            group_id,
            name: name.to_string(),
            host: format!("10.0.0.{id}"),
            port: 8443,
            protocol: String::new(),
            credentials: NodeCredentials {
                uuid: Some("5f2b1c1e-0000-4000-8000-000000000000".to_string()),
                path: Some("/ws".to_string()),
                ..Default::default()
            },
            country: String::new(),
            city: String::new(),
            flag_emoji: String::new(),
            is_active: true,
            sort_order: 0,
        }
    }

    fn ids(nodes: &[AggregatedNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn test_static_nodes_sort_before_grouped() {
        let servers = vec![server(2, "Zeta", 5), server(1, "Alpha", 5), server(3, "Beta", 1)];
        let groups = vec![group(10, "US West", true)];
        let nodes = vec![node(7, Some(10), "b"), node(6, Some(10), "a")];

        let merged = merge_nodes(&servers, &groups, &nodes, &[10]);
        assert_eq!(
            ids(&merged),
            vec!["server_3", "server_1", "server_2", "edgetunnel_6", "edgetunnel_7"]
        );
        assert_eq!(merged[3].name, "US West - a");
        assert_eq!(merged[3].protocol, "vless");
        assert_eq!(merged[3].sort_order, DYNAMIC_SORT_OFFSET);
    }

    #[test]
    fn test_disabled_group_hides_active_nodes() {
        let groups = vec![group(10, "US", false), group(11, "EU", true)];
        let nodes = vec![node(1, Some(10), "us-1"), node(2, Some(11), "eu-1")];

        let merged = merge_nodes(&[], &groups, &nodes, &[10, 11]);
        assert_eq!(ids(&merged), vec!["edgetunnel_2"]);
    }

    #[test]
    fn test_orphaned_and_unentitled_nodes_are_excluded() {
        let groups = vec![group(10, "US", true), group(11, "EU", true)];
        let nodes = vec![
            node(1, None, "orphan"),
            node(2, Some(99), "missing group"),
            node(3, Some(11), "not entitled"),
            node(4, Some(10), "ok"),
        ];

        let merged = merge_nodes(&[], &groups, &nodes, &[10]);
        assert_eq!(ids(&merged), vec!["edgetunnel_4"]);
    }

    #[test]
    fn test_inactive_entries_and_bad_ports_are_skipped() {
        let mut off = server(1, "off", 0);
        off.is_active = false;
        let mut bad_port = server(2, "bad", 0);
        bad_port.port = 70_000;
        let mut inactive_node = node(3, Some(10), "idle");
        inactive_node.is_active = false;

        let merged = merge_nodes(
            &[off, bad_port, server(4, "ok", 0)],
            &[group(10, "G", true)],
            &[inactive_node],
            &[10],
        );
        assert_eq!(ids(&merged), vec!["server_4"]);
    }

    #[test]
    fn test_ordering_is_deterministic() {
        let servers = vec![server(1, "Same", 0), server(2, "Same", 0), server(3, "Other", 0)];
        let groups = vec![group(10, "G", true), group(11, "H", true)];
        let nodes = vec![node(5, Some(11), "x"), node(4, Some(10), "x")];

        let forward = merge_nodes(&servers, &groups, &nodes, &[10, 11]);

        let mut rs = servers.clone();
        rs.reverse();
        let mut rg = groups.clone();
        rg.reverse();
        let mut rn = nodes.clone();
        rn.reverse();
        let backward = merge_nodes(&rs, &rg, &rn, &[11, 10]);

        assert_eq!(forward, backward);
        assert_eq!(
            ids(&forward),
            vec!["server_3", "server_1", "server_2", "edgetunnel_4", "edgetunnel_5"]
        );
    }

    #[test]
    fn test_duplicate_entries_emitted_once() {
        let groups = vec![group(10, "G", true), group(10, "G", true)];
        let nodes = vec![node(1, Some(10), "a"), node(1, Some(10), "a")];
        let merged = merge_nodes(&[server(1, "s", 0), server(1, "s", 0)], &groups, &nodes, &[10, 10]);
        assert_eq!(ids(&merged), vec!["server_1", "edgetunnel_1"]);
    }

    #[test]
    fn test_node_stats() {
        let merged = merge_nodes(
            &[server(1, "a", 0), server(2, "b", 0)],
            &[group(10, "G", true)],
            &[node(1, Some(10), "n")],
            &[10],
        );
        let stats = NodeStats::of(&merged);
        assert_eq!(stats.static_count, 2);
        assert_eq!(stats.grouped_count, 1);
        assert_eq!(stats.total_count, 3);
    }

    #[test]
    fn test_source_is_tagged_in_json() {
        let merged = merge_nodes(&[], &[group(10, "G", true)], &[node(1, Some(10), "n")], &[10]);
        let json = serde_json::to_value(&merged[0]).unwrap();
        assert_eq!(json["id"], "edgetunnel_1");
        assert_eq!(json["source_type"], "grouped");
        assert_eq!(json["group_id"], 10);
        assert_eq!(json["uuid"], "5f2b1c1e-0000-4000-8000-000000000000");
    }

    struct FixtureInventory {
        servers: Vec<StaticServer>,
        mapping: Vec<(i64, i64)>,
        groups: Vec<NodeGroup>,
        nodes: Vec<GroupedNode>,
    }

    #[async_trait]
    impl NodeInventory for FixtureInventory {
        async fn active_servers(&self) -> Result<Vec<StaticServer>, InventoryError> {
            Ok(self.servers.iter().filter(|s| s.is_active).cloned().collect())
        }

        async fn entitled_group_ids(&self, plan_id: i64) -> Result<Vec<i64>, InventoryError> {
            Ok(self
                .mapping
                .iter()
                .filter(|(p, _)| *p == plan_id)
                .map(|(_, g)| *g)
                .collect())
        }

        async fn groups(&self, ids: &[i64]) -> Result<Vec<NodeGroup>, InventoryError> {
            Ok(self.groups.iter().filter(|g| ids.contains(&g.id)).cloned().collect())
        }

        async fn active_grouped_nodes(
            &self,
            group_ids: &[i64],
        ) -> Result<Vec<GroupedNode>, InventoryError> {
            Ok(self
                .nodes
                .iter()
                .filter(|n| n.is_active && n.group_id.is_some_and(|g| group_ids.contains(&g)))
                .cloned()
                .collect())
        }
    }

    fn subscription(plan_id: i64) -> SubscriptionInfo {
        SubscriptionInfo {
            id: 42,
            user_id: 7,
            plan_id,
            plan_name: "Pro".to_string(),
            end_date: 1_760_000_000,
        }
    }

    #[tokio::test]
    async fn test_aggregate_scopes_groups_to_plan() {
        let inventory = FixtureInventory {
            servers: vec![server(1, "Tokyo", 0)],
            mapping: vec![(1, 10), (2, 11)],
            groups: vec![group(10, "US", true), group(11, "EU", true)],
            nodes: vec![node(1, Some(10), "us"), node(2, Some(11), "eu")],
        };

        let plan1 = aggregate(&inventory, &subscription(1)).await.unwrap();
        assert_eq!(ids(&plan1), vec!["server_1", "edgetunnel_1"]);

        let plan3 = aggregate(&inventory, &subscription(3)).await.unwrap();
        assert_eq!(ids(&plan3), vec!["server_1"]);
    }

    #[tokio::test]
    async fn test_aggregate_repeated_calls_agree() {
        let inventory = FixtureInventory {
            servers: vec![server(2, "b", 0), server(1, "a", 0)],
            mapping: vec![(1, 10)],
            groups: vec![group(10, "G", true)],
            nodes: vec![node(2, Some(10), "y"), node(1, Some(10), "x")],
        };
        let first = aggregate(&inventory, &subscription(1)).await.unwrap();
        let second = aggregate(&inventory, &subscription(1)).await.unwrap();
        assert_eq!(first, second);
    }
}
