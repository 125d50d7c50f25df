//! 镜像合成模块 - 从入站事件构造协议兼容的镜像 payload
//!
//! 车机投影协议只认会话式通知：标题 + 消息列表 + 动作列表。合成永远
//! best-effort，内容缺失用占位顶上，不让单个坏字段拖垮整次发布。

use serde::{Deserialize, Serialize};

use super::action::{ActionRole, ActionTarget, ReplyInput};
use crate::host::PostedEvent;
use crate::icon::normalize_icon;
use crate::profile::ProfileKind;
use crate::record::NotificationRecord;

/// 镜像里的用户可见文案
mod msg {
    pub const REPLY_AVAILABLE: &str = "Reply available";
    pub const REPLY_UNAVAILABLE: &str = "Reply not available";
    pub const DEFAULT_REPLY_TITLE: &str = "Reply";
    pub const DEFAULT_MARK_READ_TITLE: &str = "Mark read";
    pub const DEFAULT_REPLY_KEY: &str = "reply";
    pub const NO_RECENT_MESSAGES: &str = "No recent messages";
}

/// 镜像会话里的一条消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorMessage {
    pub sender: String,
    pub text: String,
    #[serde(default)]
    pub timestamp: i64,
}

/// 镜像上的一个动作（展示侧；回调留在 tracker 里按序号桥接）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorAction {
    pub role: ActionRole,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_input: Option<ReplyInput>,
    /// 车机动作一律不拉起前台界面
    pub requires_ui: bool,
}

/// 发布给宿主的完整镜像 payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorPayload {
    pub mirror_id: i32,
    pub package: String,
    pub profile: ProfileKind,
    /// 会话显示名（Work / Private 带 profile 后缀）
    pub conversation_title: String,
    pub messages: Vec<MirrorMessage>,
    pub actions: Vec<MirrorAction>,
    /// 标准 base64 图标，解码失败时为占位图
    pub icon: String,
    /// 声明移除回调：用户关掉镜像时宿主必须回报 mirror_dismissed
    pub report_dismissal: bool,
}

/// 镜像合成器
pub struct MirrorBuilder;

impl MirrorBuilder {
    pub fn new() -> Self {
        Self
    }

    /// 从 posted 事件合成镜像 payload
    ///
    /// `cached_icon` 是存储里的应用图标缓存，事件自带图标优先。
    pub fn build(&self, mirror_id: i32, event: &PostedEvent, cached_icon: Option<&str>) -> MirrorPayload {
        let title = event
            .conversation
            .as_ref()
            .and_then(|c| c.conversation_title.clone())
            .or_else(|| event.title.clone())
            .unwrap_or_else(|| event.app_label.clone());

        let actions = Self::build_actions(&event.actions);
        let has_reply = actions.iter().any(|a| a.reply_input.is_some());

        let messages = match &event.conversation {
            Some(conversation) if !conversation.messages.is_empty() => {
                let mut messages: Vec<MirrorMessage> = conversation
                    .messages
                    .iter()
                    .map(|m| MirrorMessage {
                        sender: m.sender.clone(),
                        text: m.text.clone(),
                        timestamp: m.timestamp,
                    })
                    .collect();
                // 能力提示只追加在最后一条消息上
                if let Some(last) = messages.last_mut() {
                    let capability = if has_reply { msg::REPLY_AVAILABLE } else { msg::REPLY_UNAVAILABLE };
                    last.text = format!("{}\n({})", last.text, capability);
                }
                messages
            }
            _ => vec![MirrorMessage {
                sender: event.title.clone().unwrap_or_else(|| event.app_label.clone()),
                text: event.text.clone().unwrap_or_default(),
                timestamp: event.posted_at,
            }],
        };

        MirrorPayload {
            mirror_id,
            package: event.package.clone(),
            profile: event.profile,
            conversation_title: Self::tag_title(title, event.profile),
            messages,
            actions,
            icon: normalize_icon(event.icon.as_deref().or(cached_icon)),
            report_dismissal: true,
        }
    }

    /// 为手动触发的镜像合成 payload（没有入站事件，取最近一条历史记录）
    pub fn build_manual(
        &self,
        mirror_id: i32,
        package: &str,
        app_label: &str,
        profile: ProfileKind,
        record: Option<&NotificationRecord>,
        cached_icon: Option<&str>,
    ) -> MirrorPayload {
        let title = record
            .and_then(|r| r.title.clone())
            .unwrap_or_else(|| app_label.to_string());
        let text = record
            .and_then(|r| r.text.clone())
            .unwrap_or_else(|| msg::NO_RECENT_MESSAGES.to_string());
        let icon = record
            .and_then(|r| r.icon.as_deref())
            .or(cached_icon);

        MirrorPayload {
            mirror_id,
            package: package.to_string(),
            profile,
            conversation_title: Self::tag_title(title.clone(), profile),
            messages: vec![MirrorMessage {
                sender: title,
                text,
                timestamp: record.map(|r| r.posted_at).unwrap_or(0),
            }],
            actions: Self::default_actions(),
            icon: normalize_icon(icon),
            report_dismissal: true,
        }
    }

    /// Work / Private profile 的标题打上后缀
    fn tag_title(title: String, profile: ProfileKind) -> String {
        match profile.display_suffix() {
            Some(suffix) => format!("{}{}", title, suffix),
            None => title,
        }
    }

    /// 原始动作一比一映射；原始没有动作时补默认的回复 + 已读
    fn build_actions(originals: &[ActionTarget]) -> Vec<MirrorAction> {
        if originals.is_empty() {
            return Self::default_actions();
        }
        originals
            .iter()
            .map(|action| MirrorAction {
                role: action.role,
                title: action.title.clone(),
                reply_input: action.reply_input.clone(),
                requires_ui: false,
            })
            .collect()
    }

    fn default_actions() -> Vec<MirrorAction> {
        vec![
            MirrorAction {
                role: ActionRole::Reply,
                title: msg::DEFAULT_REPLY_TITLE.to_string(),
                reply_input: Some(ReplyInput {
                    key: msg::DEFAULT_REPLY_KEY.to_string(),
                    label: Some(msg::DEFAULT_REPLY_TITLE.to_string()),
                }),
                requires_ui: false,
            },
            MirrorAction {
                role: ActionRole::MarkRead,
                title: msg::DEFAULT_MARK_READ_TITLE.to_string(),
                reply_input: None,
                requires_ui: false,
            },
        ]
    }
}

impl Default for MirrorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ConversationMessage, ConversationSnapshot};
    use crate::icon::PLACEHOLDER_ICON;

    fn thread_event() -> PostedEvent {
        PostedEvent::new("com.mail", "k1", 1000)
            .with_label("Mail")
            .with_title("Team thread")
            .with_text("latest line")
            .with_conversation(ConversationSnapshot {
                conversation_title: Some("Team thread".to_string()),
                messages: vec![
                    ConversationMessage { sender: "Alice".to_string(), text: "hi".to_string(), timestamp: 1 },
                    ConversationMessage { sender: "Bob".to_string(), text: "hello".to_string(), timestamp: 2 },
                    ConversationMessage { sender: "Alice".to_string(), text: "lunch?".to_string(), timestamp: 3 },
                ],
            })
    }

    #[test]
    fn test_personal_profile_has_no_suffix() {
        let payload = MirrorBuilder::new().build(1, &PostedEvent::new("com.chat", "k", 1).with_title("Alice"), None);
        assert_eq!(payload.conversation_title, "Alice");
    }

    #[test]
    fn test_work_profile_title_suffix() {
        let event = PostedEvent::new("com.chat", "k", 1)
            .with_title("Alice")
            .with_profile(ProfileKind::Work);
        let payload = MirrorBuilder::new().build(1, &event, None);
        assert_eq!(payload.conversation_title, "Alice (Work)");
    }

    #[test]
    fn test_private_profile_title_suffix() {
        let event = PostedEvent::new("com.chat", "k", 1)
            .with_title("Alice")
            .with_profile(ProfileKind::Private);
        let payload = MirrorBuilder::new().build(1, &event, None);
        assert_eq!(payload.conversation_title, "Alice (Private)");
    }

    #[test]
    fn test_conversation_cloned_message_for_message() {
        let payload = MirrorBuilder::new().build(1, &thread_event(), None);
        assert_eq!(payload.messages.len(), 3);
        assert_eq!(payload.messages[0].sender, "Alice");
        assert_eq!(payload.messages[1].sender, "Bob");
        assert_eq!(payload.messages[0].text, "hi");
    }

    #[test]
    fn test_capability_indicator_on_final_message_only() {
        let payload = MirrorBuilder::new().build(1, &thread_event(), None);
        // 原始没有动作 -> 默认动作含回复 -> 标注可回复
        assert!(payload.messages[2].text.contains("Reply available"));
        assert!(!payload.messages[0].text.contains("Reply"));
        assert!(!payload.messages[1].text.contains("Reply"));
    }

    #[test]
    fn test_capability_indicator_reply_unavailable() {
        let event = thread_event().with_actions(vec![ActionTarget::new(
            ActionRole::MarkRead,
            "Mark read",
            "t1",
        )]);
        let payload = MirrorBuilder::new().build(1, &event, None);
        assert!(payload.messages[2].text.contains("Reply not available"));
    }

    #[test]
    fn test_single_message_fallback() {
        let event = PostedEvent::new("com.sms", "k", 500)
            .with_label("SMS")
            .with_title("Bob")
            .with_text("see you");
        let payload = MirrorBuilder::new().build(1, &event, None);
        assert_eq!(payload.messages.len(), 1);
        assert_eq!(payload.messages[0].sender, "Bob");
        assert_eq!(payload.messages[0].text, "see you");
        assert_eq!(payload.messages[0].timestamp, 500);
    }

    #[test]
    fn test_actions_mapped_one_to_one() {
        let event = PostedEvent::new("com.chat", "k", 1).with_actions(vec![
            ActionTarget::new(ActionRole::Reply, "Antworten", "t0").with_reply_input("quick_reply", None),
            ActionTarget::new(ActionRole::MarkRead, "Gelesen", "t1"),
            ActionTarget::new(ActionRole::Archive, "Archivieren", "t2"),
        ]);
        let payload = MirrorBuilder::new().build(1, &event, None);

        assert_eq!(payload.actions.len(), 3);
        assert_eq!(payload.actions[0].role, ActionRole::Reply);
        assert_eq!(payload.actions[0].title, "Antworten");
        // 回复槽沿用原始输入键
        assert_eq!(payload.actions[0].reply_input.as_ref().unwrap().key, "quick_reply");
        assert_eq!(payload.actions[2].role, ActionRole::Archive);
        assert!(payload.actions.iter().all(|a| !a.requires_ui));
    }

    #[test]
    fn test_no_original_actions_yields_defaults() {
        let payload = MirrorBuilder::new().build(1, &PostedEvent::new("com.chat", "k", 1), None);
        assert_eq!(payload.actions.len(), 2);
        assert_eq!(payload.actions[0].role, ActionRole::Reply);
        assert!(payload.actions[0].reply_input.is_some());
        assert_eq!(payload.actions[1].role, ActionRole::MarkRead);
    }

    #[test]
    fn test_report_dismissal_always_declared() {
        let payload = MirrorBuilder::new().build(1, &PostedEvent::new("com.chat", "k", 1), None);
        assert!(payload.report_dismissal);
    }

    #[test]
    fn test_bad_icon_degrades_not_fails() {
        let event = PostedEvent::new("com.chat", "k", 1).with_icon("");
        let payload = MirrorBuilder::new().build(7, &event, None);
        assert_eq!(payload.icon, PLACEHOLDER_ICON);
        assert_eq!(payload.mirror_id, 7);
    }

    #[test]
    fn test_cached_icon_used_when_event_has_none() {
        let cached = "aWNvbg==";
        let payload = MirrorBuilder::new().build(1, &PostedEvent::new("com.chat", "k", 1), Some(cached));
        assert_eq!(payload.icon, "aWNvbg==");
    }

    #[test]
    fn test_manual_mirror_uses_latest_record() {
        let record = NotificationRecord::new("com.notes", "Notes", "k1", 900, ProfileKind::Work)
            .with_title("Todo")
            .with_text("buy milk");
        let payload = MirrorBuilder::new().build_manual(5, "com.notes", "Notes", ProfileKind::Work, Some(&record), None);

        assert_eq!(payload.conversation_title, "Todo (Work)");
        assert_eq!(payload.messages.len(), 1);
        assert_eq!(payload.messages[0].text, "buy milk");
        assert_eq!(payload.actions.len(), 2);
    }

    #[test]
    fn test_manual_mirror_without_history() {
        let payload = MirrorBuilder::new().build_manual(5, "com.notes", "Notes", ProfileKind::Personal, None, None);
        assert_eq!(payload.conversation_title, "Notes");
        assert_eq!(payload.messages[0].text, "No recent messages");
        assert_eq!(payload.icon, PLACEHOLDER_ICON);
    }
}
