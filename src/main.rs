//! Car Notify Mirror CLI
//!
//! 镜像消息类通知到车机投影协议。daemon 从 stdin 读取宿主事件流
//! (JSONL)，镜像指令写到 stdout；配置操作直接读写持久化存储。

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use car_notify_mirror::{
    list_profiles, CarConnectionState, ConnectivitySignal, EventDispatcher, FilterPattern,
    HostEvent, HostNotifications, JsonlHost, MirrorDaemon, MirrorTracker, ProfileKind, RecordStore,
    RootShell, SharedConnectivity,
};

#[derive(Parser)]
#[command(name = "cnm")]
#[command(about = "Car Notify Mirror - 镜像消息类通知到车机")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 前台运行镜像 daemon（从 stdin 读取宿主事件流）
    Daemon,
    /// 后台启动 daemon
    Start,
    /// 停止后台 daemon
    Stop,
    /// 查看 daemon 与全局设置状态
    Status {
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
    /// 列出观察到的应用分区
    List {
        /// 包含已隐藏的应用
        #[arg(long)]
        all: bool,
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
    /// 查看某应用分区的通知历史
    History {
        /// 应用包名
        package: String,
        /// 用户空间 (personal / work / private)
        #[arg(long, short, default_value = "personal")]
        profile: ProfileKind,
        /// 显示最近 N 条
        #[arg(long, short, default_value = "10")]
        limit: usize,
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
    /// 为应用开启镜像
    Enable {
        package: String,
        #[arg(long, short, default_value = "personal")]
        profile: ProfileKind,
    },
    /// 为应用关闭镜像
    Disable {
        package: String,
        #[arg(long, short, default_value = "personal")]
        profile: ProfileKind,
    },
    /// 隐藏应用（列表不再显示，历史保留）
    Hide {
        package: String,
        #[arg(long, short, default_value = "personal")]
        profile: ProfileKind,
    },
    /// 取消隐藏
    Unhide {
        package: String,
        #[arg(long, short, default_value = "personal")]
        profile: ProfileKind,
    },
    /// 删除一条历史记录
    Dismiss {
        package: String,
        /// 记录键
        key: String,
        #[arg(long, short, default_value = "personal")]
        profile: ProfileKind,
    },
    /// 移除整个应用分区及其图标缓存
    Forget {
        package: String,
        #[arg(long, short, default_value = "personal")]
        profile: ProfileKind,
    },
    /// 过滤规则管理
    Filter {
        #[command(subcommand)]
        action: FilterCommands,
    },
    /// 打印手动镜像请求事件（接入宿主事件流使用）
    MirrorNow {
        package: String,
        #[arg(long, short, default_value = "personal")]
        profile: ProfileKind,
    },
    /// 全局门控：只在连上车机时镜像 (on / off)
    Gate {
        #[arg(value_parser = ["on", "off"])]
        state: String,
    },
    /// 枚举设备用户空间（需要 root）
    Profiles {
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
    /// 清空全部持久化状态
    Reset {
        /// 跳过确认
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum FilterCommands {
    /// 添加一条规则
    Add {
        package: String,
        /// 正则文本
        pattern: String,
        #[arg(long, short, default_value = "personal")]
        profile: ProfileKind,
        /// 加入排除列表（默认为包含列表）
        #[arg(long)]
        exclude: bool,
        /// 应用于标题
        #[arg(long)]
        title: bool,
        /// 应用于正文
        #[arg(long)]
        text: bool,
        /// 颜色序号
        #[arg(long, default_value = "0")]
        color: u8,
    },
    /// 按序号删除一条规则
    Remove {
        package: String,
        /// 规则序号（`filter list` 的顺序）
        index: usize,
        #[arg(long, short, default_value = "personal")]
        profile: ProfileKind,
        /// 从排除列表删除
        #[arg(long)]
        exclude: bool,
    },
    /// 列出规则
    List {
        package: String,
        #[arg(long, short, default_value = "personal")]
        profile: ProfileKind,
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
    /// 用样本标题/正文试运行过滤器
    Test {
        package: String,
        #[arg(long, short, default_value = "personal")]
        profile: ProfileKind,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        text: Option<String>,
    },
}

/// 车机连接状态事件（事件流里和宿主事件混发）
#[derive(Debug, Deserialize)]
struct CarStateEvent {
    state: CarConnectionState,
}

#[tokio::main]
async fn main() -> Result<()> {
    // daemon 的 stdout 是指令通道，日志一律走 stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Daemon => run_daemon().await,
        Commands::Start => {
            let daemon = MirrorDaemon::new();
            if daemon.ensure_started()? {
                println!("Daemon started");
            } else {
                println!("Daemon already running");
            }
            Ok(())
        }
        Commands::Stop => {
            let daemon = MirrorDaemon::new();
            if daemon.stop()? {
                println!("Daemon stopped");
            } else {
                println!("Daemon not running");
            }
            Ok(())
        }
        Commands::Status { json } => cmd_status(json),
        Commands::List { all, json } => cmd_list(all, json),
        Commands::History { package, profile, limit, json } => cmd_history(&package, profile, limit, json),
        Commands::Enable { package, profile } => {
            let store = RecordStore::new();
            store.set_mirror_enabled(&package, profile, true);
            println!("Mirroring enabled for {} ({})", package, profile);
            Ok(())
        }
        Commands::Disable { package, profile } => {
            let store = RecordStore::new();
            store.set_mirror_enabled(&package, profile, false);
            println!("Mirroring disabled for {} ({})", package, profile);
            Ok(())
        }
        Commands::Hide { package, profile } => {
            let store = RecordStore::new();
            store.set_disabled(&package, profile);
            println!("{} ({}) hidden", package, profile);
            Ok(())
        }
        Commands::Unhide { package, profile } => {
            let store = RecordStore::new();
            store.set_enabled(&package, profile);
            println!("{} ({}) visible again", package, profile);
            Ok(())
        }
        Commands::Dismiss { package, key, profile } => {
            let store = RecordStore::new();
            if store.remove(&package, profile, &key) {
                println!("Removed record {}", key);
            } else {
                println!("No record {} for {} ({})", key, package, profile);
            }
            Ok(())
        }
        Commands::Forget { package, profile } => {
            let store = RecordStore::new();
            store.remove_app(&package, profile);
            println!("Forgot {} ({})", package, profile);
            Ok(())
        }
        Commands::Filter { action } => cmd_filter(action),
        Commands::MirrorNow { package, profile } => {
            // 手动镜像在 daemon 进程里执行；这里打印事件行供 shim 注入
            let event = HostEvent::MirrorRequest { package, profile };
            println!("{}", serde_json::to_string(&event)?);
            Ok(())
        }
        Commands::Gate { state } => {
            let store = RecordStore::new();
            let connected_only = state == "on";
            store.set_connected_only(connected_only);
            if connected_only {
                println!("Mirroring only while connected to the car");
            } else {
                println!("Mirroring regardless of car connection");
            }
            Ok(())
        }
        Commands::Profiles { json } => cmd_profiles(json),
        Commands::Reset { yes } => cmd_reset(yes),
    }
}

// ==================== daemon ====================

async fn run_daemon() -> Result<()> {
    let daemon = MirrorDaemon::new();
    daemon.write_pid(std::process::id())?;

    let store = Arc::new(RecordStore::new());
    let tracker = Arc::new(MirrorTracker::new());
    let connectivity = Arc::new(SharedConnectivity::default());
    let host: Arc<dyn HostNotifications> = Arc::new(JsonlHost::new());
    let dispatcher = EventDispatcher::new(
        Arc::clone(&store),
        Arc::clone(&tracker),
        host,
        Arc::clone(&connectivity) as Arc<dyn ConnectivitySignal>,
    );

    info!("Mirror daemon started, reading host events from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut sigterm = signal(SignalKind::terminate())?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down");
                break;
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if !line.is_empty() {
                            handle_feed_line(&dispatcher, &connectivity, line);
                        }
                    }
                    Ok(None) => {
                        info!("Event feed closed");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to read event feed");
                        break;
                    }
                }
            }
        }
    }

    daemon.remove_pid()?;
    Ok(())
}

/// 处理事件流里的一行：车机状态事件本地消化，其余交给调度器
fn handle_feed_line(dispatcher: &EventDispatcher, connectivity: &SharedConnectivity, line: &str) {
    let value: serde_json::Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Malformed feed line, skipping");
            return;
        }
    };

    if value.get("type").and_then(|t| t.as_str()) == Some("car_state") {
        match serde_json::from_value::<CarStateEvent>(value) {
            Ok(event) => {
                info!(state = %event.state, "Car connection state changed");
                connectivity.set(event.state);
            }
            Err(e) => warn!(error = %e, "Malformed car_state event"),
        }
        return;
    }

    match serde_json::from_value::<HostEvent>(value) {
        Ok(event) => {
            if matches!(event, HostEvent::Connected { .. }) {
                spawn_profile_scan();
            }
            dispatcher.handle(event);
        }
        Err(e) => warn!(line = %line, error = %e, "Unrecognized feed event, skipping"),
    }
}

/// 监听器连接后在后台线程枚举用户空间（root shell 是同步阻塞调用）
fn spawn_profile_scan() {
    tokio::task::spawn_blocking(|| {
        let shell = RootShell::new();
        if !shell.is_available() {
            debug!("No root shell available, skipping profile enumeration");
            return;
        }
        let profiles = list_profiles(&shell);
        info!(count = profiles.len(), "Enumerated device user profiles");
        for profile in profiles {
            debug!(user_id = profile.user_id, name = %profile.name, running = profile.running, "Device profile");
        }
    });
}

// ==================== 查询类命令 ====================

fn cmd_status(json: bool) -> Result<()> {
    let daemon = MirrorDaemon::new();
    let store = RecordStore::new();
    let settings = store.settings();
    let apps = store.list_apps(true);

    if json {
        let status = serde_json::json!({
            "daemon_running": daemon.is_running(),
            "connected_only": settings.connected_only,
            "partitions": apps.len(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("Daemon:         {}", if daemon.is_running() { "running" } else { "stopped" });
        println!("Gate:           {}", if settings.connected_only { "mirror only while connected" } else { "always mirror" });
        println!("App partitions: {}", apps.len());
    }
    Ok(())
}

fn cmd_list(all: bool, json: bool) -> Result<()> {
    let store = RecordStore::new();
    let apps = store.list_apps(all);

    if json {
        println!("{}", serde_json::to_string_pretty(&apps)?);
        return Ok(());
    }

    if apps.is_empty() {
        println!("No notifications observed yet");
        return Ok(());
    }
    for app in apps {
        let mut flags = Vec::new();
        if app.mirror_enabled {
            flags.push("mirrored");
        }
        if app.disabled {
            flags.push("hidden");
        }
        let flags = if flags.is_empty() { String::new() } else { format!(" [{}]", flags.join(", ")) };
        println!(
            "{} ({}) - {} records{}",
            app.label,
            app.profile,
            app.records.len(),
            flags
        );
    }
    Ok(())
}

fn cmd_history(package: &str, profile: ProfileKind, limit: usize, json: bool) -> Result<()> {
    let store = RecordStore::new();
    let records = store.records(package, profile);
    let records = &records[..records.len().min(limit)];

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No records for {} ({})", package, profile);
        return Ok(());
    }
    for record in records {
        let ts = chrono::DateTime::from_timestamp_millis(record.posted_at)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| record.posted_at.to_string());
        println!(
            "[{}] {} | {}: {}",
            ts,
            record.key,
            record.title.as_deref().unwrap_or("-"),
            record.text.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

// ==================== 过滤器命令 ====================

fn cmd_filter(action: FilterCommands) -> Result<()> {
    let store = RecordStore::new();
    match action {
        FilterCommands::Add { package, pattern, profile, exclude, title, text, color } => {
            let config = store.config(&package, profile);
            let mut include = config.include;
            let mut exclude_list = config.exclude;

            // 两个开关都没给时默认只匹配正文
            let (to_title, to_text) = if !title && !text { (false, true) } else { (title, text) };
            let filter = FilterPattern::new(pattern)
                .with_targets(to_title, to_text)
                .with_color(color);

            if exclude {
                exclude_list.push(filter);
            } else {
                include.push(filter);
            }
            store.set_filters(&package, profile, include, exclude_list);
            println!("Filter added for {} ({})", package, profile);
            Ok(())
        }
        FilterCommands::Remove { package, index, profile, exclude } => {
            let config = store.config(&package, profile);
            let mut include = config.include;
            let mut exclude_list = config.exclude;

            let list = if exclude { &mut exclude_list } else { &mut include };
            if index >= list.len() {
                println!("No filter at index {}", index);
                return Ok(());
            }
            let removed = list.remove(index);
            store.set_filters(&package, profile, include, exclude_list);
            println!("Removed filter: {}", removed.pattern);
            Ok(())
        }
        FilterCommands::List { package, profile, json } => {
            let config = store.config(&package, profile);
            if json {
                let lists = serde_json::json!({
                    "include": config.include,
                    "exclude": config.exclude,
                });
                println!("{}", serde_json::to_string_pretty(&lists)?);
                return Ok(());
            }
            println!("Include:");
            for (i, filter) in config.include.iter().enumerate() {
                println!("  {}: {}", i, filter.pattern);
            }
            println!("Exclude:");
            for (i, filter) in config.exclude.iter().enumerate() {
                println!("  {}: {}", i, filter.pattern);
            }
            Ok(())
        }
        FilterCommands::Test { package, profile, title, text } => {
            let config = store.config(&package, profile);
            let mut record =
                car_notify_mirror::NotificationRecord::new(package.as_str(), package.as_str(), "test", 1, profile);
            if let Some(title) = title {
                record = record.with_title(title);
            }
            if let Some(text) = text {
                record = record.with_text(text);
            }

            let passes = car_notify_mirror::filter::matches(&record, &config.include, &config.exclude);
            println!("Result: {}", if passes { "would mirror" } else { "filtered out" });
            if let Some(m) = car_notify_mirror::filter::first_match(&record, &config.include, &config.exclude) {
                println!(
                    "First match: {:?} pattern #{} \"{}\" at {}..{}",
                    m.source, m.pattern_index, m.pattern.pattern, m.start, m.end
                );
            }
            Ok(())
        }
    }
}

// ==================== 其他命令 ====================

fn cmd_profiles(json: bool) -> Result<()> {
    let shell = RootShell::new();
    if !shell.is_available() {
        println!("No root shell available");
        return Ok(());
    }
    let profiles = list_profiles(&shell);

    if json {
        println!("{}", serde_json::to_string_pretty(&profiles)?);
        return Ok(());
    }
    if profiles.is_empty() {
        println!("No profiles found (root denied?)");
        return Ok(());
    }
    for profile in profiles {
        println!(
            "{}: {}{}",
            profile.user_id,
            profile.name,
            if profile.running { " (running)" } else { "" }
        );
    }
    Ok(())
}

fn cmd_reset(yes: bool) -> Result<()> {
    if !yes {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt("Erase all history, filters and settings?")
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Aborted");
            return Ok(());
        }
    }
    let store = RecordStore::new();
    store.reset();
    println!("Storage reset");
    Ok(())
}
