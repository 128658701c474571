/// Bus topic carrying direct messages
pub const TOPIC_MESSAGES: &str = "MESSAGES";

/// Bus topic carrying friend requests
pub const TOPIC_FRIEND_REQUESTS: &str = "FriendRequests";

/// Bus topic carrying friend acceptances
pub const TOPIC_FRIENDS: &str = "Friends";

/// Prefix of per-user store keys (`user:{id}`, `user:{id}:Friends`)
pub const PROFILE_KEY_PREFIX: &str = "user:";

/// Suffix of the friend set key
pub const FRIENDS_KEY_SUFFIX: &str = ":Friends";

/// Prefix of conversation sorted sets (`user:messages:{larger}--{lower}`)
pub const CONVERSATION_KEY_PREFIX: &str = "user:messages:";

/// Sorted-set member holding the unread counter
pub const UNREAD_MEMBER: &str = "unread";

/// Separator of the legacy friend-acceptance payload (`acceptor:accepted:sender`)
pub const ACCEPTED_SEPARATOR: &str = ":accepted:";

/// Default HTTP / WebSocket port
pub const DEFAULT_HTTP_PORT: u16 = 5000;

/// Default per-connection outbound queue length
pub const DEFAULT_OUTBOUND_BUFFER: usize = 256;
