//! Root shell 模块 - 跨 profile 枚举用的特权命令执行
//!
//! 核心镜像路径不依赖 root；这里只服务外围的 profile 枚举。
//! 命令通过 `su -c` 执行，带硬超时，任何失败都返回 None 而不是
//! 挂住调用线程。

use regex::Regex;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// 默认命令超时
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
/// 等待子进程退出的轮询间隔
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Root shell 执行器
pub struct RootShell {
    su_path: Option<PathBuf>,
    timeout: Duration,
}

impl RootShell {
    /// 在 PATH 中定位 su
    pub fn new() -> Self {
        Self {
            su_path: which::which("su").ok(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// 指定 su 路径（测试用，任何可执行文件都行）
    pub fn with_su_path(path: PathBuf) -> Self {
        Self {
            su_path: Some(path),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// 设置超时（链式调用）
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 是否找到了 su
    pub fn is_available(&self) -> bool {
        self.su_path.is_some()
    }

    /// 以 root 执行命令，返回原始 stdout；任何失败或超时都返回 None
    pub fn run(&self, command: &str) -> Option<String> {
        let su = self.su_path.as_ref()?;

        let mut child = match Command::new(su)
            .args(["-c", command])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!(command = %command, error = %e, "Failed to spawn root shell");
                return None;
            }
        };

        let deadline = Instant::now() + self.timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    let mut output = String::new();
                    if let Some(mut stdout) = child.stdout.take() {
                        let _ = stdout.read_to_string(&mut output);
                    }
                    if !status.success() {
                        debug!(command = %command, status = %status, "Root shell command failed");
                        return None;
                    }
                    return Some(output);
                }
                Ok(None) => {
                    if Instant::now() >= deadline {
                        warn!(command = %command, "Root shell command timed out, killing");
                        let _ = child.kill();
                        let _ = child.wait();
                        return None;
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    warn!(command = %command, error = %e, "Failed to wait for root shell");
                    let _ = child.kill();
                    return None;
                }
            }
        }
    }
}

impl Default for RootShell {
    fn default() -> Self {
        Self::new()
    }
}

/// 设备上的一个用户空间
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UserProfile {
    pub user_id: i32,
    pub name: String,
    pub running: bool,
}

/// 解析 `pm list users` 的输出
///
/// 典型行：`	UserInfo{10:Work profile:1030} running`
pub fn parse_user_list(output: &str) -> Vec<UserProfile> {
    let re = match Regex::new(r"UserInfo\{(\d+):([^:]*):[0-9a-fA-F]+\}( running)?") {
        Ok(re) => re,
        Err(_) => return Vec::new(),
    };

    output
        .lines()
        .filter_map(|line| {
            let caps = re.captures(line)?;
            Some(UserProfile {
                user_id: caps.get(1)?.as_str().parse().ok()?,
                name: caps.get(2)?.as_str().to_string(),
                running: caps.get(3).is_some(),
            })
        })
        .collect()
}

/// 枚举设备上的用户空间；没有 root 或命令失败时返回空列表
pub fn list_profiles(shell: &RootShell) -> Vec<UserProfile> {
    match shell.run("pm list users") {
        Some(output) => parse_user_list(&output),
        None => Vec::new(),
    }
}
