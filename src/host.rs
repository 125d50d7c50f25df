//! 宿主边界模块 - 通知子系统的入站事件与出站指令
//!
//! 入站：平台 shim 以 JSONL 形式投递 posted / removed / 生命周期事件。
//! 出站：核心通过 `HostNotifications` trait 发布、取消、桥接，从不直接
//! 触碰平台 API。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::mirror::action::{ActionTarget, BridgedReply, CallbackTarget};
use crate::mirror::synthesis::MirrorPayload;
use crate::profile::ProfileKind;
use crate::record::NotificationRecord;

/// 会话式通知里的一条消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// 发送者显示名
    pub sender: String,
    /// 消息文本
    pub text: String,
    /// 消息时间戳（毫秒）
    #[serde(default)]
    pub timestamp: i64,
}

/// 源应用自带的会话结构（能提取到才有）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSnapshot {
    /// 会话标题
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_title: Option<String>,
    /// 累积的消息列表（旧到新）
    #[serde(default)]
    pub messages: Vec<ConversationMessage>,
}

impl ConversationSnapshot {
    /// 线程化判定：同一条通知里累积了 2 条以上消息
    ///
    /// 这是启发式而非保证——从不暴露会话结构的应用永远按单条式处理。
    pub fn is_threaded(&self) -> bool {
        self.messages.len() >= 2
    }
}

/// 宿主投递的 posted 事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostedEvent {
    /// 来源应用包名
    pub package: String,
    /// 应用显示名称
    #[serde(default)]
    pub app_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// 到达时间戳（毫秒）
    pub posted_at: i64,
    /// 宿主分配的通知键
    pub key: String,
    #[serde(default)]
    pub profile: ProfileKind,
    /// 用户空间数字 id（提取失败时为 -1）
    #[serde(default = "unknown_user_id")]
    pub user_id: i32,
    /// 编码后的图标数据
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// 提取到的会话结构
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<ConversationSnapshot>,
    /// 原始动作列表（宿主边界翻译好的内部形状）
    #[serde(default)]
    pub actions: Vec<ActionTarget>,
}

fn unknown_user_id() -> i32 {
    -1
}

impl PostedEvent {
    /// 创建最小事件（测试与手动路径共用）
    pub fn new(package: impl Into<String>, key: impl Into<String>, posted_at: i64) -> Self {
        let package = package.into();
        Self {
            app_label: package.clone(),
            package,
            title: None,
            text: None,
            posted_at,
            key: key.into(),
            profile: ProfileKind::Personal,
            user_id: 0,
            icon: None,
            conversation: None,
            actions: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.app_label = label.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_profile(mut self, profile: ProfileKind) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_conversation(mut self, conversation: ConversationSnapshot) -> Self {
        self.conversation = Some(conversation);
        self
    }

    pub fn with_actions(mut self, actions: Vec<ActionTarget>) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// 是否线程化内容
    pub fn is_threaded(&self) -> bool {
        self.conversation.as_ref().map(|c| c.is_threaded()).unwrap_or(false)
    }

    /// 转换为入库记录
    pub fn to_record(&self) -> NotificationRecord {
        NotificationRecord {
            package: self.package.clone(),
            app_label: self.app_label.clone(),
            title: self.title.clone(),
            text: self.text.clone(),
            posted_at: self.posted_at,
            key: self.key.clone(),
            profile: self.profile,
            user_id: self.user_id,
            icon: self.icon.clone(),
        }
    }
}

/// 入站事件流的统一形状（JSONL，每行一个事件）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    /// 监听器已连接；携带宿主当前活动集合用于对账
    Connected {
        #[serde(default)]
        active_keys: Vec<String>,
        #[serde(default)]
        active_mirrors: Vec<i32>,
    },
    /// 监听器断开
    Disconnected,
    /// 新通知或通知更新
    Posted(PostedEvent),
    /// 原始通知被移除
    Removed { key: String },
    /// 用户关掉了某个镜像
    MirrorDismissed { mirror_id: i32 },
    /// 用户点击了镜像上的动作
    MirrorAction {
        mirror_id: i32,
        action_index: i32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reply_text: Option<String>,
    },
    /// UI 请求的手动镜像
    MirrorRequest {
        package: String,
        #[serde(default)]
        profile: ProfileKind,
    },
}

impl HostEvent {
    /// 解析一行 JSONL 事件
    pub fn parse_line(line: &str) -> Result<HostEvent> {
        serde_json::from_str(line.trim()).with_context(|| format!("invalid host event: {}", line))
    }
}

/// 出站指令（核心 -> 宿主）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum HostCommand {
    PostMirror { mirror_id: i32, payload: MirrorPayload },
    CancelMirror { mirror_id: i32 },
    CancelOriginal { key: String },
    InvokeAction {
        callback: CallbackTarget,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reply: Option<BridgedReply>,
    },
}

/// 核心对宿主通知子系统的出站契约
pub trait HostNotifications: Send + Sync {
    /// 发布一个镜像通知
    fn post_mirror(&self, mirror_id: i32, payload: &MirrorPayload) -> Result<()>;
    /// 取消一个镜像通知
    fn cancel_mirror(&self, mirror_id: i32);
    /// 取消一条原始通知（级联关闭）
    fn cancel_original(&self, key: &str);
    /// 触发原始动作的回调，可携带桥接回复
    fn invoke_action(&self, target: &CallbackTarget, reply: Option<BridgedReply>) -> Result<()>;
}

/// 标准输出 JSONL 宿主：每条指令一行，由平台 shim 消费
pub struct JsonlHost;

impl JsonlHost {
    pub fn new() -> Self {
        Self
    }

    fn emit(&self, command: &HostCommand) -> Result<()> {
        let line = serde_json::to_string(command)?;
        println!("{}", line);
        Ok(())
    }
}

impl Default for JsonlHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostNotifications for JsonlHost {
    fn post_mirror(&self, mirror_id: i32, payload: &MirrorPayload) -> Result<()> {
        self.emit(&HostCommand::PostMirror {
            mirror_id,
            payload: payload.clone(),
        })
    }

    fn cancel_mirror(&self, mirror_id: i32) {
        let _ = self.emit(&HostCommand::CancelMirror { mirror_id });
    }

    fn cancel_original(&self, key: &str) {
        let _ = self.emit(&HostCommand::CancelOriginal { key: key.to_string() });
    }

    fn invoke_action(&self, target: &CallbackTarget, reply: Option<BridgedReply>) -> Result<()> {
        self.emit(&HostCommand::InvokeAction {
            callback: target.clone(),
            reply,
        })
    }
}

/// 内存宿主替身：记录全部出站指令，测试用
#[derive(Default)]
pub struct RecordingHost {
    commands: Mutex<Vec<HostCommand>>,
    /// 置为 true 时 post_mirror 失败（测试合成回滚路径）
    pub fail_posts: std::sync::atomic::AtomicBool,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<HostCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub fn posted_mirror_ids(&self) -> Vec<i32> {
        self.commands()
            .iter()
            .filter_map(|c| match c {
                HostCommand::PostMirror { mirror_id, .. } => Some(*mirror_id),
                _ => None,
            })
            .collect()
    }

    pub fn cancelled_mirror_ids(&self) -> Vec<i32> {
        self.commands()
            .iter()
            .filter_map(|c| match c {
                HostCommand::CancelMirror { mirror_id } => Some(*mirror_id),
                _ => None,
            })
            .collect()
    }

    pub fn cancelled_original_keys(&self) -> Vec<String> {
        self.commands()
            .iter()
            .filter_map(|c| match c {
                HostCommand::CancelOriginal { key } => Some(key.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn invoked(&self) -> Vec<(CallbackTarget, Option<BridgedReply>)> {
        self.commands()
            .iter()
            .filter_map(|c| match c {
                HostCommand::InvokeAction { callback, reply } => Some((callback.clone(), reply.clone())),
                _ => None,
            })
            .collect()
    }
}

impl HostNotifications for RecordingHost {
    fn post_mirror(&self, mirror_id: i32, payload: &MirrorPayload) -> Result<()> {
        if self.fail_posts.load(std::sync::atomic::Ordering::SeqCst) {
            anyhow::bail!("post_mirror failed (test)");
        }
        self.commands.lock().unwrap().push(HostCommand::PostMirror {
            mirror_id,
            payload: payload.clone(),
        });
        Ok(())
    }

    fn cancel_mirror(&self, mirror_id: i32) {
        self.commands
            .lock()
            .unwrap()
            .push(HostCommand::CancelMirror { mirror_id });
    }

    fn cancel_original(&self, key: &str) {
        self.commands
            .lock()
            .unwrap()
            .push(HostCommand::CancelOriginal { key: key.to_string() });
    }

    fn invoke_action(&self, target: &CallbackTarget, reply: Option<BridgedReply>) -> Result<()> {
        self.commands.lock().unwrap().push(HostCommand::InvokeAction {
            callback: target.clone(),
            reply,
        });
        Ok(())
    }
}
