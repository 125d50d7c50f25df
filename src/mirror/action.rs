//! 动作模型 - 原始通知动作的内部表示与桥接数据
//!
//! 宿主边界把任意形态的动作列表翻译成这里的带标签结构，核心代码只认这一种
//! 形状。回复能力由 `reply_input` 是否存在决定。

use serde::{Deserialize, Serialize};

/// 手动镜像的动作序号哨兵值：没有原始动作可桥接，只做关闭
pub const MANUAL_ACTION_INDEX: i32 = -1;

/// 动作的语义角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionRole {
    Reply,
    MarkRead,
    MarkUnread,
    Delete,
    Archive,
    Mute,
    Unmute,
    ThumbsUp,
    ThumbsDown,
    Call,
    Other,
}

impl ActionRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionRole::Reply => "reply",
            ActionRole::MarkRead => "mark_read",
            ActionRole::MarkUnread => "mark_unread",
            ActionRole::Delete => "delete",
            ActionRole::Archive => "archive",
            ActionRole::Mute => "mute",
            ActionRole::Unmute => "unmute",
            ActionRole::ThumbsUp => "thumbs_up",
            ActionRole::ThumbsDown => "thumbs_down",
            ActionRole::Call => "call",
            ActionRole::Other => "other",
        }
    }
}

impl std::fmt::Display for ActionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 回复输入槽：原始动作声明的自由文本输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyInput {
    /// 原始动作声明的输入键，桥接回复时必须沿用
    pub key: String,
    /// 输入框提示文本
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// 原始动作的回调目标（宿主持有的不透明句柄）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackTarget {
    pub token: String,
}

impl CallbackTarget {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

/// 一条原始动作：角色 + 标题 + 可选回复槽 + 回调目标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionTarget {
    pub role: ActionRole,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_input: Option<ReplyInput>,
    pub callback: CallbackTarget,
}

impl ActionTarget {
    pub fn new(role: ActionRole, title: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            role,
            title: title.into(),
            reply_input: None,
            callback: CallbackTarget::new(token),
        }
    }

    /// 设置回复输入槽（链式调用）
    pub fn with_reply_input(mut self, key: impl Into<String>, label: Option<String>) -> Self {
        self.reply_input = Some(ReplyInput { key: key.into(), label });
        self
    }

    /// 是否具备自由文本回复能力
    pub fn is_reply(&self) -> bool {
        self.reply_input.is_some()
    }
}

/// 桥接给原始回调的回复：用户输入重新包在原始输入键下
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgedReply {
    /// 原始动作声明的输入键
    pub input_key: String,
    /// 用户输入的回复文本
    pub text: String,
}
