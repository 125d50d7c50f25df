//! 镜像引擎 - 关系追踪、内容指纹、动作桥接与 payload 合成

pub mod action;
pub mod fingerprint;
pub mod synthesis;
pub mod tracker;

pub use action::{ActionRole, ActionTarget, BridgedReply, CallbackTarget, ReplyInput, MANUAL_ACTION_INDEX};
pub use fingerprint::content_fingerprint;
pub use synthesis::{MirrorAction, MirrorBuilder, MirrorMessage, MirrorPayload};
pub use tracker::{ManualResolution, MirrorTracker, Resolution, MIRROR_ID_BASE};
