use tg_domain::access::ClassAccessConfig;
use tg_domain::error::Result;

/// Storage boundary for access policy and usage counters.
///
/// Reads are plain lookups. The two counter writes are single atomic
/// check-and-modify operations: implementations must never let concurrent
/// callers both pass the check on the last unit.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    /// The stored policy for a class, or `None` if the class is unknown.
    async fn class_config(&self, class_id: &str) -> Result<Option<ClassAccessConfig>>;

    /// Free queries left for a free-standing user.
    ///
    /// A user with no balance yet reads as the store's default grant. This
    /// never writes; the balance is stored on the first decrement.
    async fn quota_balance(&self, user_id: &str) -> Result<u32>;

    /// Atomically take one token if the balance is positive.
    ///
    /// Returns the balance after the decrement, or `None` if it was already 0.
    async fn decrement_quota_if_positive(&self, user_id: &str) -> Result<Option<u32>>;

    /// Queries a user has made inside a class.
    async fn class_queries_used(&self, class_id: &str, user_id: &str) -> Result<u32>;

    /// Atomically count one more class query if the user is below `limit`.
    ///
    /// Returns the new count, or `None` if the limit was already reached.
    async fn increment_class_queries_below(
        &self,
        class_id: &str,
        user_id: &str,
        limit: u32,
    ) -> Result<Option<u32>>;
}
