//! Car Notify Mirror - 把消息类通知镜像到车机投影协议

pub mod connectivity;
pub mod daemon;
pub mod dispatcher;
pub mod filter;
pub mod host;
pub mod icon;
pub mod mirror;
pub mod profile;
pub mod record;
pub mod shell;
pub mod storage;
pub mod store;

pub use connectivity::{CarConnectionState, ConnectivitySignal, SharedConnectivity};
pub use daemon::MirrorDaemon;
pub use dispatcher::EventDispatcher;
pub use filter::{FilterMatch, FilterPattern, MatchField, PatternSource};
pub use host::{
    ConversationMessage, ConversationSnapshot, HostCommand, HostEvent, HostNotifications, JsonlHost,
    PostedEvent, RecordingHost,
};
pub use mirror::{
    ActionRole, ActionTarget, BridgedReply, CallbackTarget, ManualResolution, MirrorAction,
    MirrorBuilder, MirrorMessage, MirrorPayload, MirrorTracker, ReplyInput, Resolution,
    MANUAL_ACTION_INDEX, MIRROR_ID_BASE,
};
pub use profile::{partition_key, ProfileKind};
pub use record::NotificationRecord;
pub use shell::{list_profiles, parse_user_list, RootShell, UserProfile};
pub use storage::MirrorStorage;
pub use store::{AppPartition, AppProfileConfig, FilterLists, RecordStore, Settings};
