pub mod edgetunnel_group;
pub mod edgetunnel_node;
pub mod plan;
pub mod plan_edgetunnel_group;
pub mod server;
pub mod subscription_token;
pub mod user_subscription;

pub use edgetunnel_group::Entity as EdgetunnelGroup;
pub use edgetunnel_node::Entity as EdgetunnelNode;
pub use plan::Entity as Plan;
pub use plan_edgetunnel_group::Entity as PlanEdgetunnelGroup;
pub use server::Entity as Server;
pub use subscription_token::Entity as SubscriptionToken;
pub use user_subscription::Entity as UserSubscription;
