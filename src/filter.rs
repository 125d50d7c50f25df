//! 过滤器模块 - 基于正则的包含/排除规则评估
//!
//! ## 评估规则
//! 1. 空白模式一律忽略
//! 2. 存在非空包含规则时，至少命中一条才放行
//! 3. 任意一条排除规则命中即拒绝
//! 4. 无效正则视为"永不命中"（宽松失败，绝不抛错）

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::record::NotificationRecord;

/// 单条正则过滤规则
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterPattern {
    /// 正则文本
    pub pattern: String,
    /// UI 显示用的颜色序号
    #[serde(default)]
    pub color_index: u8,
    /// 是否应用于标题
    #[serde(default)]
    pub apply_to_title: bool,
    /// 是否应用于正文
    #[serde(default = "default_true")]
    pub apply_to_text: bool,
}

fn default_true() -> bool {
    true
}

impl FilterPattern {
    /// 创建默认规则（仅匹配正文）
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            color_index: 0,
            apply_to_title: false,
            apply_to_text: true,
        }
    }

    /// 设置应用范围（链式调用）
    pub fn with_targets(mut self, title: bool, text: bool) -> Self {
        self.apply_to_title = title;
        self.apply_to_text = text;
        self
    }

    /// 设置颜色序号（链式调用）
    pub fn with_color(mut self, color_index: u8) -> Self {
        self.color_index = color_index;
        self
    }

    pub fn is_blank(&self) -> bool {
        self.pattern.trim().is_empty()
    }

    /// 实际生效的应用范围；两个开关都关闭时回退为仅正文
    pub fn effective_targets(&self) -> (bool, bool) {
        if !self.apply_to_title && !self.apply_to_text {
            (false, true)
        } else {
            (self.apply_to_title, self.apply_to_text)
        }
    }

    /// 编译正则（大小写不敏感）；无效正则返回 None
    fn compile(&self) -> Option<Regex> {
        RegexBuilder::new(&self.pattern)
            .case_insensitive(true)
            .build()
            .ok()
    }

    /// 规则是否命中记录
    pub fn matches(&self, record: &NotificationRecord) -> bool {
        if self.is_blank() {
            return false;
        }
        let re = match self.compile() {
            Some(re) => re,
            None => return false,
        };
        let (to_title, to_text) = self.effective_targets();
        if to_text {
            if let Some(text) = &record.text {
                if re.is_match(text) {
                    return true;
                }
            }
        }
        if to_title {
            if let Some(title) = &record.title {
                if re.is_match(title) {
                    return true;
                }
            }
        }
        false
    }

    /// 在指定字段中查找首个命中范围
    fn find_in(&self, field: MatchField, record: &NotificationRecord) -> Option<(usize, usize)> {
        if self.is_blank() {
            return None;
        }
        let (to_title, to_text) = self.effective_targets();
        let value = match field {
            MatchField::Text if to_text => record.text.as_deref()?,
            MatchField::Title if to_title => record.title.as_deref()?,
            _ => return None,
        };
        let re = self.compile()?;
        re.find(value).map(|m| (m.start(), m.end()))
    }
}

/// 命中的字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    Text,
    Title,
}

/// 规则来源列表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternSource {
    Include,
    Exclude,
}

/// UI 高亮用的命中描述
#[derive(Debug, Clone, PartialEq)]
pub struct FilterMatch {
    /// 命中的字段
    pub field: MatchField,
    /// 命中范围起点（字节偏移）
    pub start: usize,
    /// 命中范围终点（字节偏移）
    pub end: usize,
    /// 规则在所属列表中的序号
    pub pattern_index: usize,
    /// 规则来源列表
    pub source: PatternSource,
    /// 命中的规则本身
    pub pattern: FilterPattern,
}

/// 记录是否通过 (包含, 排除) 规则集
pub fn matches(record: &NotificationRecord, include: &[FilterPattern], exclude: &[FilterPattern]) -> bool {
    let includes: Vec<&FilterPattern> = include.iter().filter(|p| !p.is_blank()).collect();
    if !includes.is_empty() && !includes.iter().any(|p| p.matches(record)) {
        return false;
    }

    let excludes: Vec<&FilterPattern> = exclude.iter().filter(|p| !p.is_blank()).collect();
    if excludes.iter().any(|p| p.matches(record)) {
        return false;
    }

    true
}

/// 返回首个命中：正文字段优先于标题字段，同字段按声明顺序
pub fn first_match(
    record: &NotificationRecord,
    include: &[FilterPattern],
    exclude: &[FilterPattern],
) -> Option<FilterMatch> {
    for field in [MatchField::Text, MatchField::Title] {
        let lists = [(PatternSource::Include, include), (PatternSource::Exclude, exclude)];
        for (source, patterns) in lists {
            for (pattern_index, pattern) in patterns.iter().enumerate() {
                if let Some((start, end)) = pattern.find_in(field, record) {
                    return Some(FilterMatch {
                        field,
                        start,
                        end,
                        pattern_index,
                        source,
                        pattern: pattern.clone(),
                    });
                }
            }
        }
    }
    None
}
