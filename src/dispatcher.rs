//! 事件调度模块 - 宿主事件入口与镜像编排
//!
//! 监听器生命周期：断开 -> 连接（注册回调、对账清扫）-> 断开。
//! posted 事件：入库 -> 门控 -> 过滤 -> 解析镜像 -> 合成发布；
//! removed 事件：历史保留，追踪器级联无条件执行。
//!
//! 任何入口都不向宿主回调抛错：失败就地记日志并降级。

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::connectivity::ConnectivitySignal;
use crate::filter;
use crate::host::{HostEvent, HostNotifications, PostedEvent};
use crate::mirror::action::BridgedReply;
use crate::mirror::synthesis::MirrorBuilder;
use crate::mirror::tracker::MirrorTracker;
use crate::profile::ProfileKind;
use crate::store::RecordStore;

/// 事件调度器
pub struct EventDispatcher {
    store: Arc<RecordStore>,
    tracker: Arc<MirrorTracker>,
    builder: MirrorBuilder,
    host: Arc<dyn HostNotifications>,
    connectivity: Arc<dyn ConnectivitySignal>,
    listener_connected: AtomicBool,
}

impl EventDispatcher {
    pub fn new(
        store: Arc<RecordStore>,
        tracker: Arc<MirrorTracker>,
        host: Arc<dyn HostNotifications>,
        connectivity: Arc<dyn ConnectivitySignal>,
    ) -> Self {
        Self {
            store,
            tracker,
            builder: MirrorBuilder::new(),
            host,
            connectivity,
            listener_connected: AtomicBool::new(false),
        }
    }

    /// 统一入口：一条入站事件走一次路由
    pub fn handle(&self, event: HostEvent) {
        match event {
            HostEvent::Connected { active_keys, active_mirrors } => {
                self.on_listener_connected(&active_keys, &active_mirrors)
            }
            HostEvent::Disconnected => self.on_listener_disconnected(),
            HostEvent::Posted(posted) => self.on_posted(posted),
            HostEvent::Removed { key } => self.on_removed(&key),
            HostEvent::MirrorDismissed { mirror_id } => self.on_mirror_dismissed(mirror_id),
            HostEvent::MirrorAction { mirror_id, action_index, reply_text } => {
                self.bridge_action(mirror_id, action_index, reply_text)
            }
            HostEvent::MirrorRequest { package, profile } => {
                let _ = self.mirror_now(&package, profile);
            }
        }
    }

    /// 监听器连接：对账清扫，自愈崩溃/重启后的残留条目
    pub fn on_listener_connected(&self, active_keys: &[String], active_mirrors: &[i32]) {
        self.listener_connected.store(true, Ordering::SeqCst);
        let live_keys: HashSet<String> = active_keys.iter().cloned().collect();
        let live_mirrors: HashSet<i32> = active_mirrors.iter().copied().collect();
        self.tracker.prune_stale(&live_keys, &live_mirrors);
        info!(
            active_keys = active_keys.len(),
            active_mirrors = active_mirrors.len(),
            "Listener connected"
        );
    }

    pub fn on_listener_disconnected(&self) {
        self.listener_connected.store(false, Ordering::SeqCst);
        info!("Listener disconnected");
    }

    pub fn is_listener_connected(&self) -> bool {
        self.listener_connected.load(Ordering::SeqCst)
    }

    /// posted 事件：入库、门控、过滤、镜像
    pub fn on_posted(&self, event: PostedEvent) {
        if !self.store.add(event.to_record()) {
            // 非法记录静默丢弃
            return;
        }
        if let Some(icon) = &event.icon {
            self.store.set_icon(&event.package, event.profile, icon.clone());
        }

        let config = self.store.config(&event.package, event.profile);
        if config.disabled || !config.mirror_enabled {
            return;
        }
        if !self.gate_open() {
            debug!(package = %event.package, "Mirror gate closed, not connected to car");
            return;
        }
        let record = event.to_record();
        if !filter::matches(&record, &config.include, &config.exclude) {
            debug!(package = %event.package, key = %event.key, "Record filtered out");
            return;
        }

        let resolution = self.tracker.resolve_or_create(
            &event.package,
            event.profile,
            event.title.as_deref(),
            event.text.as_deref(),
            &event.key,
            event.is_threaded(),
        );
        if let Some(old) = resolution.displaced {
            self.host.cancel_mirror(old);
        }
        self.tracker.register_actions(resolution.mirror_id, event.actions.clone());

        if resolution.created {
            let cached_icon = self.store.icon(&event.package, event.profile);
            let payload = self.builder.build(resolution.mirror_id, &event, cached_icon.as_deref());
            if let Err(e) = self.host.post_mirror(resolution.mirror_id, &payload) {
                // 合成/发布失败：回滚全部注册，追踪器不能指向一个从未发布的镜像
                warn!(
                    mirror_id = resolution.mirror_id,
                    package = %event.package,
                    error = %e,
                    "Failed to post mirror, rolling back registrations"
                );
                self.tracker.release_mirror(resolution.mirror_id);
            }
        }
    }

    /// removed 事件：历史不动，追踪器摘键，孤儿镜像取消
    pub fn on_removed(&self, key: &str) {
        if let Some(mirror_id) = self.tracker.on_original_removed(key) {
            debug!(key = %key, mirror_id, "Last original gone, cancelling mirror");
            self.host.cancel_mirror(mirror_id);
        }
    }

    /// 用户关掉镜像：级联取消名下全部原始通知
    pub fn on_mirror_dismissed(&self, mirror_id: i32) {
        let keys = self.tracker.on_mirror_dismissed(mirror_id);
        for key in &keys {
            self.host.cancel_original(key);
        }
        if !keys.is_empty() {
            debug!(mirror_id, originals = keys.len(), "Mirror dismissed, cascaded to originals");
        }
    }

    /// 手动镜像：绕过过滤器，仍受连接门控
    pub fn mirror_now(&self, package: &str, profile: ProfileKind) -> Option<i32> {
        if !self.gate_open() {
            info!(package = %package, "Manual mirror skipped, gate closed");
            return None;
        }

        let records = self.store.records(package, profile);
        let latest = records.first();
        let label = latest
            .map(|r| r.app_label.clone())
            .unwrap_or_else(|| package.to_string());

        let manual = self.tracker.resolve_or_create_manual(package, profile);
        if let Some(old) = manual.replaced {
            self.host.cancel_mirror(old);
        }

        let cached_icon = self.store.icon(package, profile);
        let payload = self.builder.build_manual(
            manual.mirror_id,
            package,
            &label,
            profile,
            latest,
            cached_icon.as_deref(),
        );
        match self.host.post_mirror(manual.mirror_id, &payload) {
            Ok(()) => {
                info!(package = %package, mirror_id = manual.mirror_id, "Posted manual mirror");
                Some(manual.mirror_id)
            }
            Err(e) => {
                warn!(package = %package, error = %e, "Manual mirror failed, rolling back");
                self.tracker.release_mirror(manual.mirror_id);
                None
            }
        }
    }

    /// 动作桥接：把镜像上的点击转发给原始动作的回调目标
    ///
    /// 负数序号是手动镜像哨兵，只做关闭。桥接后镜像总是取消。
    pub fn bridge_action(&self, mirror_id: i32, action_index: i32, reply_text: Option<String>) {
        if action_index < 0 {
            self.tracker.release_mirror(mirror_id);
            self.host.cancel_mirror(mirror_id);
            return;
        }

        match self.tracker.action(mirror_id, action_index as usize) {
            Some(target) => {
                let reply = match (&target.reply_input, reply_text) {
                    (Some(input), Some(text)) => Some(BridgedReply {
                        input_key: input.key.clone(),
                        text,
                    }),
                    _ => None,
                };
                if let Err(e) = self.host.invoke_action(&target.callback, reply) {
                    warn!(mirror_id, action_index, error = %e, "Failed to invoke bridged action");
                }
            }
            None => {
                debug!(mirror_id, action_index, "No action target registered, dismiss only");
            }
        }

        self.host.cancel_mirror(mirror_id);
        self.tracker.release_mirror(mirror_id);
    }

    /// 连接门控：开关打开时要求车机在线，关闭时无条件放行
    fn gate_open(&self) -> bool {
        if !self.store.settings().connected_only {
            return true;
        }
        self.connectivity.state().is_connected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::{CarConnectionState, SharedConnectivity};
    use crate::filter::FilterPattern;
    use crate::host::{ConversationMessage, ConversationSnapshot, HostCommand, RecordingHost};
    use crate::mirror::action::{ActionRole, ActionTarget, MANUAL_ACTION_INDEX};
    use tempfile::tempdir;

    struct Fixture {
        dispatcher: EventDispatcher,
        store: Arc<RecordStore>,
        tracker: Arc<MirrorTracker>,
        host: Arc<RecordingHost>,
        connectivity: Arc<SharedConnectivity>,
        _temp: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let temp = tempdir().unwrap();
        let store = Arc::new(RecordStore::new_for_test(temp.path().to_path_buf()));
        let tracker = Arc::new(MirrorTracker::new());
        let host = Arc::new(RecordingHost::new());
        let connectivity = Arc::new(SharedConnectivity::new(CarConnectionState::Projected));
        let dispatcher = EventDispatcher::new(
            Arc::clone(&store),
            Arc::clone(&tracker),
            Arc::clone(&host) as Arc<dyn HostNotifications>,
            Arc::clone(&connectivity) as Arc<dyn ConnectivitySignal>,
        );
        Fixture {
            dispatcher,
            store,
            tracker,
            host,
            connectivity,
            _temp: temp,
        }
    }

    fn chat_event(key: &str, text: &str) -> PostedEvent {
        PostedEvent::new("com.chat", key, 1000)
            .with_label("Chat")
            .with_title("Alice")
            .with_text(text)
    }

    fn threaded_event(key: &str) -> PostedEvent {
        PostedEvent::new("com.mail", key, 1000)
            .with_label("Mail")
            .with_title("Team thread")
            .with_text("lunch?")
            .with_conversation(ConversationSnapshot {
                conversation_title: Some("Team thread".to_string()),
                messages: vec![
                    ConversationMessage { sender: "A".to_string(), text: "hi".to_string(), timestamp: 1 },
                    ConversationMessage { sender: "B".to_string(), text: "lunch?".to_string(), timestamp: 2 },
                ],
            })
    }

    // ==================== posted 流程 tests ====================

    #[test]
    fn test_posted_with_mirror_enabled_posts() {
        let f = fixture();
        f.store.set_mirror_enabled("com.chat", ProfileKind::Personal, true);

        f.dispatcher.on_posted(chat_event("k1", "hi"));

        assert_eq!(f.host.posted_mirror_ids().len(), 1);
        assert!(f.tracker.mirror_for_key("k1").is_some());
        // 历史也入库了
        assert_eq!(f.store.records("com.chat", ProfileKind::Personal).len(), 1);
    }

    #[test]
    fn test_posted_without_mirror_enabled_stores_only() {
        let f = fixture();
        f.dispatcher.on_posted(chat_event("k1", "hi"));

        assert!(f.host.posted_mirror_ids().is_empty());
        assert!(f.tracker.is_empty());
        assert_eq!(f.store.records("com.chat", ProfileKind::Personal).len(), 1);
    }

    #[test]
    fn test_invalid_record_dropped_silently() {
        let f = fixture();
        f.store.set_mirror_enabled("com.chat", ProfileKind::Personal, true);
        f.dispatcher.on_posted(chat_event("", "hi"));

        assert!(f.host.commands().is_empty());
        assert!(f.tracker.is_empty());
        assert!(f.store.records("com.chat", ProfileKind::Personal).is_empty());
    }

    #[test]
    fn test_disabled_app_not_mirrored() {
        let f = fixture();
        f.store.set_mirror_enabled("com.chat", ProfileKind::Personal, true);
        f.store.set_disabled("com.chat", ProfileKind::Personal);

        f.dispatcher.on_posted(chat_event("k1", "hi"));
        assert!(f.host.posted_mirror_ids().is_empty());
    }

    #[test]
    fn test_gate_blocks_when_not_connected() {
        let f = fixture();
        f.store.set_mirror_enabled("com.chat", ProfileKind::Personal, true);
        f.connectivity.set(CarConnectionState::NotConnected);

        f.dispatcher.on_posted(chat_event("k1", "hi"));
        assert!(f.host.posted_mirror_ids().is_empty());
        // 历史照常入库
        assert_eq!(f.store.records("com.chat", ProfileKind::Personal).len(), 1);
    }

    #[test]
    fn test_gate_toggle_off_mirrors_unconditionally() {
        let f = fixture();
        f.store.set_mirror_enabled("com.chat", ProfileKind::Personal, true);
        f.store.set_connected_only(false);
        f.connectivity.set(CarConnectionState::NotConnected);

        f.dispatcher.on_posted(chat_event("k1", "hi"));
        assert_eq!(f.host.posted_mirror_ids().len(), 1);
    }

    #[test]
    fn test_filter_rejects_mirror() {
        let f = fixture();
        f.store.set_mirror_enabled("com.chat", ProfileKind::Personal, true);
        f.store.set_filters(
            "com.chat",
            ProfileKind::Personal,
            vec![FilterPattern::new("urgent")],
            vec![],
        );

        f.dispatcher.on_posted(chat_event("k1", "lunch?"));
        assert!(f.host.posted_mirror_ids().is_empty());

        f.dispatcher.on_posted(chat_event("k2", "urgent: meeting now"));
        assert_eq!(f.host.posted_mirror_ids().len(), 1);
    }

    #[test]
    fn test_threaded_duplicate_folds_single_post() {
        let f = fixture();
        f.store.set_mirror_enabled("com.mail", ProfileKind::Personal, true);

        f.dispatcher.on_posted(threaded_event("k1"));
        f.dispatcher.on_posted(threaded_event("k2"));

        // 折叠：只发布一次
        assert_eq!(f.host.posted_mirror_ids().len(), 1);
        assert_eq!(f.tracker.mirror_for_key("k1"), f.tracker.mirror_for_key("k2"));
    }

    #[test]
    fn test_episodic_duplicates_post_separately() {
        let f = fixture();
        f.store.set_mirror_enabled("com.chat", ProfileKind::Personal, true);

        f.dispatcher.on_posted(chat_event("k1", "same text"));
        // 注意：存储层按内容去重历史，但 tracker 对单条式内容绝不折叠
        f.dispatcher.on_posted(chat_event("k2", "same text"));

        assert_eq!(f.host.posted_mirror_ids().len(), 2);
        assert_ne!(f.tracker.mirror_for_key("k1"), f.tracker.mirror_for_key("k2"));
    }

    #[test]
    fn test_key_reuse_cancels_displaced_mirror() {
        let f = fixture();
        f.store.set_mirror_enabled("com.chat", ProfileKind::Personal, true);

        f.dispatcher.on_posted(chat_event("k1", "first"));
        let first = f.host.posted_mirror_ids()[0];
        f.dispatcher.on_posted(chat_event("k1", "second"));

        assert!(f.host.cancelled_mirror_ids().contains(&first));
        assert_eq!(f.host.posted_mirror_ids().len(), 2);
    }

    #[test]
    fn test_post_failure_rolls_back_tracker() {
        let f = fixture();
        f.store.set_mirror_enabled("com.chat", ProfileKind::Personal, true);
        f.host.fail_posts.store(true, Ordering::SeqCst);

        f.dispatcher.on_posted(chat_event("k1", "hi"));

        // 追踪器不能引用从未发布的镜像
        assert!(f.tracker.is_empty());
        // 历史仍然入库
        assert_eq!(f.store.records("com.chat", ProfileKind::Personal).len(), 1);
    }

    #[test]
    fn test_event_icon_cached_for_later_mirrors() {
        let f = fixture();
        f.dispatcher.on_posted(chat_event("k1", "hi").with_icon("aWNvbg=="));
        assert_eq!(f.store.icon("com.chat", ProfileKind::Personal).as_deref(), Some("aWNvbg=="));
    }

    // ==================== removed / dismiss tests ====================

    #[test]
    fn test_removed_cancels_orphaned_mirror() {
        let f = fixture();
        f.store.set_mirror_enabled("com.chat", ProfileKind::Personal, true);
        f.dispatcher.on_posted(chat_event("k1", "hi"));
        let mirror_id = f.host.posted_mirror_ids()[0];

        f.dispatcher.on_removed("k1");
        assert_eq!(f.host.cancelled_mirror_ids(), vec![mirror_id]);
        // 历史保留
        assert_eq!(f.store.records("com.chat", ProfileKind::Personal).len(), 1);
    }

    #[test]
    fn test_removed_keeps_mirror_while_fold_remains() {
        let f = fixture();
        f.store.set_mirror_enabled("com.mail", ProfileKind::Personal, true);
        f.dispatcher.on_posted(threaded_event("k1"));
        f.dispatcher.on_posted(threaded_event("k2"));

        f.dispatcher.on_removed("k2");
        assert!(f.host.cancelled_mirror_ids().is_empty());

        f.dispatcher.on_removed("k1");
        assert_eq!(f.host.cancelled_mirror_ids().len(), 1);
    }

    #[test]
    fn test_removed_unknown_key_is_noop() {
        let f = fixture();
        f.dispatcher.on_removed("never-seen");
        assert!(f.host.commands().is_empty());
    }

    #[test]
    fn test_mirror_dismissed_cascades_to_originals() {
        let f = fixture();
        f.store.set_mirror_enabled("com.mail", ProfileKind::Personal, true);
        f.dispatcher.on_posted(threaded_event("k1"));
        f.dispatcher.on_posted(threaded_event("k2"));
        let mirror_id = f.host.posted_mirror_ids()[0];

        f.dispatcher.on_mirror_dismissed(mirror_id);

        let cancelled = f.host.cancelled_original_keys();
        assert_eq!(cancelled, vec!["k1".to_string(), "k2".to_string()]);
        assert!(f.tracker.is_empty());
    }

    // ==================== manual mirror tests ====================

    #[test]
    fn test_manual_mirror_bypasses_filter() {
        let f = fixture();
        // 过滤器拒绝一切，mirror_enabled 也没开
        f.store.set_filters(
            "com.notes",
            ProfileKind::Work,
            vec![FilterPattern::new("nothing-matches-this")],
            vec![],
        );
        f.store.add(
            crate::record::NotificationRecord::new("com.notes", "Notes", "n1", 900, ProfileKind::Work)
                .with_title("Todo")
                .with_text("buy milk"),
        );

        let mirror_id = f.dispatcher.mirror_now("com.notes", ProfileKind::Work).unwrap();
        assert_eq!(f.host.posted_mirror_ids(), vec![mirror_id]);
    }

    #[test]
    fn test_manual_mirror_respects_gate() {
        let f = fixture();
        f.connectivity.set(CarConnectionState::NotConnected);
        assert!(f.dispatcher.mirror_now("com.notes", ProfileKind::Work).is_none());
        assert!(f.host.commands().is_empty());
    }

    #[test]
    fn test_second_manual_mirror_replaces_first() {
        let f = fixture();
        let first = f.dispatcher.mirror_now("com.notes", ProfileKind::Work).unwrap();
        let second = f.dispatcher.mirror_now("com.notes", ProfileKind::Work).unwrap();

        assert_ne!(first, second);
        assert!(f.host.cancelled_mirror_ids().contains(&first));
        assert_eq!(f.tracker.manual_mirror("com.notes", ProfileKind::Work), Some(second));
        assert_eq!(f.tracker.mirror_count(), 1);
    }

    #[test]
    fn test_manual_mirror_failure_rolls_back() {
        let f = fixture();
        f.host.fail_posts.store(true, Ordering::SeqCst);
        assert!(f.dispatcher.mirror_now("com.notes", ProfileKind::Work).is_none());
        assert!(f.tracker.is_empty());
    }

    // ==================== bridge tests ====================

    #[test]
    fn test_bridge_reply_action() {
        let f = fixture();
        f.store.set_mirror_enabled("com.chat", ProfileKind::Personal, true);
        let event = chat_event("k1", "hi").with_actions(vec![
            ActionTarget::new(ActionRole::Reply, "Reply", "cb-reply").with_reply_input("quick_reply", None),
            ActionTarget::new(ActionRole::MarkRead, "Mark read", "cb-read"),
        ]);
        f.dispatcher.on_posted(event);
        let mirror_id = f.host.posted_mirror_ids()[0];

        f.dispatcher.bridge_action(mirror_id, 0, Some("on my way".to_string()));

        let invoked = f.host.invoked();
        assert_eq!(invoked.len(), 1);
        assert_eq!(invoked[0].0.token, "cb-reply");
        let reply = invoked[0].1.as_ref().unwrap();
        // 回复必须包在原始输入键下
        assert_eq!(reply.input_key, "quick_reply");
        assert_eq!(reply.text, "on my way");
        // 桥接后镜像取消、条目清空
        assert!(f.host.cancelled_mirror_ids().contains(&mirror_id));
        assert!(f.tracker.is_empty());
    }

    #[test]
    fn test_bridge_plain_action_no_payload() {
        let f = fixture();
        f.store.set_mirror_enabled("com.chat", ProfileKind::Personal, true);
        let event = chat_event("k1", "hi").with_actions(vec![
            ActionTarget::new(ActionRole::MarkRead, "Mark read", "cb-read"),
        ]);
        f.dispatcher.on_posted(event);
        let mirror_id = f.host.posted_mirror_ids()[0];

        f.dispatcher.bridge_action(mirror_id, 0, Some("ignored".to_string()));

        let invoked = f.host.invoked();
        assert_eq!(invoked[0].0.token, "cb-read");
        assert!(invoked[0].1.is_none());
    }

    #[test]
    fn test_bridge_manual_sentinel_dismisses_only() {
        let f = fixture();
        let mirror_id = f.dispatcher.mirror_now("com.notes", ProfileKind::Work).unwrap();

        f.dispatcher.bridge_action(mirror_id, MANUAL_ACTION_INDEX, Some("typed".to_string()));

        assert!(f.host.invoked().is_empty());
        assert!(f.host.cancelled_mirror_ids().contains(&mirror_id));
        assert!(f.tracker.is_empty());
    }

    #[test]
    fn test_bridge_unknown_action_still_cancels_mirror() {
        let f = fixture();
        f.store.set_mirror_enabled("com.chat", ProfileKind::Personal, true);
        f.dispatcher.on_posted(chat_event("k1", "hi"));
        let mirror_id = f.host.posted_mirror_ids()[0];

        f.dispatcher.bridge_action(mirror_id, 99, None);
        assert!(f.host.invoked().is_empty());
        assert!(f.host.cancelled_mirror_ids().contains(&mirror_id));
    }

    // ==================== 生命周期 tests ====================

    #[test]
    fn test_connect_prunes_stale_entries() {
        let f = fixture();
        f.store.set_mirror_enabled("com.chat", ProfileKind::Personal, true);
        f.dispatcher.on_posted(chat_event("k1", "hi"));
        f.dispatcher.on_posted(chat_event("k2", "yo"));
        let live = f.tracker.mirror_for_key("k2").unwrap();

        // 模拟崩溃重启后重连：宿主侧只剩 k2 和它的镜像
        f.dispatcher.on_listener_connected(&["k2".to_string()], &[live]);

        assert!(f.tracker.mirror_for_key("k1").is_none());
        assert_eq!(f.tracker.mirror_for_key("k2"), Some(live));
        assert!(f.dispatcher.is_listener_connected());
    }

    #[test]
    fn test_disconnect_flips_state() {
        let f = fixture();
        f.dispatcher.on_listener_connected(&[], &[]);
        assert!(f.dispatcher.is_listener_connected());
        f.dispatcher.on_listener_disconnected();
        assert!(!f.dispatcher.is_listener_connected());
    }

    #[test]
    fn test_handle_routes_events() {
        let f = fixture();
        f.store.set_mirror_enabled("com.chat", ProfileKind::Personal, true);

        f.dispatcher.handle(HostEvent::Connected { active_keys: vec![], active_mirrors: vec![] });
        f.dispatcher.handle(HostEvent::Posted(chat_event("k1", "hi")));
        let mirror_id = f.host.posted_mirror_ids()[0];
        f.dispatcher.handle(HostEvent::Removed { key: "k1".to_string() });

        assert!(f.host.cancelled_mirror_ids().contains(&mirror_id));
    }

    #[test]
    fn test_handle_mirror_request_event() {
        let f = fixture();
        f.dispatcher.handle(HostEvent::MirrorRequest {
            package: "com.notes".to_string(),
            profile: ProfileKind::Personal,
        });
        assert_eq!(f.host.posted_mirror_ids().len(), 1);
    }

    #[test]
    fn test_payload_contents_flow_through() {
        let f = fixture();
        f.store.set_mirror_enabled("com.chat", ProfileKind::Work, true);
        let event = chat_event("k1", "hello").with_profile(ProfileKind::Work);
        f.dispatcher.on_posted(event);

        let commands = f.host.commands();
        match &commands[0] {
            HostCommand::PostMirror { payload, .. } => {
                assert_eq!(payload.conversation_title, "Alice (Work)");
                assert!(payload.report_dismissal);
            }
            other => panic!("expected post_mirror, got {:?}", other),
        }
    }
}
