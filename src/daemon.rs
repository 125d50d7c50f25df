//! Daemon 管理模块 - 镜像服务后台进程的生命周期

use anyhow::Result;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use sysinfo::{Pid, System};

/// Daemon 管理器
pub struct MirrorDaemon {
    /// 数据目录
    data_dir: PathBuf,
}

impl MirrorDaemon {
    /// 创建新的 daemon 管理器
    pub fn new() -> Self {
        let data_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("car-notify-mirror");

        let _ = fs::create_dir_all(&data_dir);

        Self { data_dir }
    }

    /// 创建用于测试的 daemon 管理器
    pub fn new_for_test() -> Self {
        let data_dir = std::env::temp_dir().join(format!("cnm-daemon-test-{}", std::process::id()));
        let _ = fs::create_dir_all(&data_dir);
        Self { data_dir }
    }

    /// 获取 PID 文件路径
    pub fn pid_file_path(&self) -> PathBuf {
        self.data_dir.join("daemon.pid")
    }

    /// 检查 daemon 是否在运行
    pub fn is_running(&self) -> bool {
        match self.read_pid() {
            Ok(Some(pid)) => Self::process_exists(pid),
            _ => false,
        }
    }

    /// 检查进程是否存在
    fn process_exists(pid: u32) -> bool {
        let system = System::new_all();
        system.process(Pid::from_u32(pid)).is_some()
    }

    /// 写入 PID 文件
    pub fn write_pid(&self, pid: u32) -> Result<()> {
        fs::write(self.pid_file_path(), pid.to_string())?;
        Ok(())
    }

    /// 读取 PID
    pub fn read_pid(&self) -> Result<Option<u32>> {
        let pid_file = self.pid_file_path();
        if !pid_file.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&pid_file)?;
        Ok(content.trim().parse().ok())
    }

    /// 删除 PID 文件
    pub fn remove_pid(&self) -> Result<()> {
        let pid_file = self.pid_file_path();
        if pid_file.exists() {
            fs::remove_file(pid_file)?;
        }
        Ok(())
    }

    /// 启动 daemon（如果未运行）
    pub fn ensure_started(&self) -> Result<bool> {
        if self.is_running() {
            return Ok(false);
        }

        let exe_path = std::env::current_exe()?;

        // Fork 后台进程运行 cnm daemon
        let child = Command::new(&exe_path)
            .args(["daemon"])
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()?;

        self.write_pid(child.id())?;

        Ok(true)
    }

    /// 停止 daemon
    pub fn stop(&self) -> Result<bool> {
        if let Some(pid) = self.read_pid()? {
            let _ = Command::new("kill")
                .args(["-TERM", &pid.to_string()])
                .output();

            self.remove_pid()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

impl Default for MirrorDaemon {
    fn default() -> Self {
        Self::new()
    }
}
