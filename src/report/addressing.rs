//! # Report Addressing Module / 报告寻址模块
//!
//! Pure functions mapping a test unit's coordinates (component, optional
//! umbrella resource, primary resource, edge index, optional sub-test) to
//! and from the flat hierarchical key under which its JSON document is
//! stored within a run's namespace.
//!
//! 纯函数，将测试单元的坐标（组件、可选的上层资源、主资源、边索引、
//! 可选的子测试）映射为运行命名空间内存储其 JSON 文档的扁平分层键，
//! 以及反向解析。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Sentinel edge index used when a unit test label carries no edge number.
/// 当单元测试标签不带边编号时使用的哨兵边索引。
pub const UNKNOWN_EDGE_NUM: i32 = -1;

/// Default sub-test identifier for labels that omit one.
/// 标签省略子测试 id 时使用的默认值。
pub const DEFAULT_TEST_ID: &str = "input";

/// The two kinds of Translator components a test run targets.
/// A knowledge provider (KP) is addressed directly; an autonomous relay
/// agent (ARA) is addressed together with the KP it was tested against.
///
/// 测试运行所针对的两类 Translator 组件。
/// 知识提供者（KP）被直接寻址；自主中继代理（ARA）与其测试所针对的 KP 一起寻址。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Component {
    /// A knowledge provider, addressed directly.
    /// 知识提供者，被直接寻址。
    KP,
    /// An autonomous relay agent, addressed with the KP it was tested against.
    /// 自主中继代理，与其测试所针对的 KP 一起寻址。
    ARA,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::KP => write!(f, "KP"),
            Component::ARA => write!(f, "ARA"),
        }
    }
}

impl FromStr for Component {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "KP" => Ok(Component::KP),
            "ARA" => Ok(Component::ARA),
            other => Err(AddressError::UnknownComponent {
                value: other.to_string(),
            }),
        }
    }
}

/// Errors raised by key construction and unit test label parsing.
/// These signal contract violations between the test runner and the report
/// consumer, not runtime conditions.
///
/// 键构建和单元测试标签解析抛出的错误。
/// 它们表示测试运行器与报告消费者之间的契约违规，而非运行时状况。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    /// The unit test label is empty or whitespace.
    /// 单元测试标签为空或仅含空白。
    #[error("empty unit test label")]
    EmptyLabel,

    /// The unit test label matches no recognizable grammar.
    /// 单元测试标签不符合任何可识别的语法。
    #[error("unit test label '{label}' does not match '[<ara>|]<kp>#<edge_num>-<test_id>'")]
    MalformedLabel { label: String },

    /// A key segment is empty or would escape the run's namespace.
    /// 某个键段为空，或会逃逸运行命名空间。
    #[error("document key segment '{segment}' is empty or contains a path element")]
    InvalidSegment { segment: String },

    /// The component string is neither 'KP' nor 'ARA'.
    /// 组件字符串既不是 'KP' 也不是 'ARA'。
    #[error("unknown component '{value}', expected 'KP' or 'ARA'")]
    UnknownComponent { value: String },

    /// A sub-test id was given without the edge it hangs off.
    /// 给出了子测试 id，却没有它所依附的边。
    #[error("sub-test id '{test_id}' was given without an edge number")]
    MissingEdge { test_id: String },
}

/// The parsed form of a compact unit test identifier, together with the
/// document key it addresses.
///
/// 紧凑单元测试标识符的解析形式，以及它所寻址的文档键。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitTestLabel {
    /// Which kind of component the label addresses.
    /// 标签寻址的组件类别。
    pub component: Component,
    /// The umbrella ARA resource, when the label names one.
    /// 上层 ARA 资源（当标签指明时）。
    pub secondary_id: Option<String>,
    /// The primary resource under test.
    /// 被测主资源。
    pub primary_id: String,
    /// Edge index within the test data, or [`UNKNOWN_EDGE_NUM`].
    /// 测试数据中的边索引，或哨兵值 [`UNKNOWN_EDGE_NUM`]。
    pub edge_num: i32,
    /// The sub-test identifier, defaulted when the label omits one.
    /// 子测试标识符，标签省略时取默认值。
    pub test_id: String,
    /// The document key equivalent of this label.
    /// 此标签等价的文档键。
    pub key: String,
}

/// Builds the slash-delimited document key for one report artifact.
///
/// The secondary (umbrella) resource id, when present, is inserted
/// immediately after the component segment. The edge segment is rendered as
/// `{primary_id}-{edge_num}`, and the sub-test id, which requires an edge,
/// becomes a trailing segment of its own. Absent optional segments are
/// simply omitted.
///
/// 为一个报告产物构建以斜杠分隔的文档键。
/// 次级（上层）资源 id 存在时紧跟在组件段之后插入。边段渲染为
/// `{primary_id}-{edge_num}`，子测试 id（需要边）成为自己的尾段。
/// 缺失的可选段直接省略。
///
/// # Examples
/// ```
/// use onehop_runner::report::addressing::{build_key, Component};
///
/// let key = build_key(Component::ARA, Some("Aragorn"), "Automat", Some(3), None).unwrap();
/// assert_eq!(key, "ARA/Aragorn/Automat/Automat-3");
/// ```
pub fn build_key(
    component: Component,
    secondary_id: Option<&str>,
    primary_id: &str,
    edge_num: Option<i32>,
    test_id: Option<&str>,
) -> Result<String, AddressError> {
    let mut segments: Vec<String> = vec![component.to_string()];

    if let Some(secondary) = secondary_id {
        validate_segment(secondary)?;
        segments.push(secondary.to_string());
    }

    validate_segment(primary_id)?;
    segments.push(primary_id.to_string());

    match (edge_num, test_id) {
        (Some(edge), test) => {
            segments.push(format!("{primary_id}-{edge}"));
            if let Some(test) = test {
                validate_segment(test)?;
                segments.push(test.to_string());
            }
        }
        (None, Some(test)) => {
            return Err(AddressError::MissingEdge {
                test_id: test.to_string(),
            });
        }
        (None, None) => {}
    }

    Ok(segments.join("/"))
}

/// Parses a compact unit test identifier of the shape
/// `[<secondary>|]<primary>#<edge_num>-<test_id>`.
///
/// A label naming two resources is an ARA label (the umbrella ARA first,
/// then the KP it was tested against); a single resource is a KP label.
/// A missing edge number defaults to [`UNKNOWN_EDGE_NUM`] and a missing
/// sub-test id to [`DEFAULT_TEST_ID`]. Anything that matches no recognizable
/// grammar is a hard parse failure.
///
/// 解析形如 `[<secondary>|]<primary>#<edge_num>-<test_id>` 的紧凑单元测试标识符。
/// 命名两个资源的标签是 ARA 标签（上层 ARA 在前，被测 KP 在后）；
/// 单个资源是 KP 标签。缺失的边编号默认为哨兵值，缺失的子测试 id 默认为 "input"。
/// 不符合任何可识别语法的输入是硬性解析失败。
///
/// # Examples
/// ```
/// use onehop_runner::report::addressing::{parse_unit_test_label, Component};
///
/// let label = parse_unit_test_label("Test_ARA|Test_KP_1#2-by_subject").unwrap();
/// assert_eq!(label.component, Component::ARA);
/// assert_eq!(label.secondary_id.as_deref(), Some("Test_ARA"));
/// assert_eq!(label.primary_id, "Test_KP_1");
/// assert_eq!(label.edge_num, 2);
/// assert_eq!(label.test_id, "by_subject");
/// ```
pub fn parse_unit_test_label(label: &str) -> Result<UnitTestLabel, AddressError> {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        return Err(AddressError::EmptyLabel);
    }

    let (resources, unit) = match trimmed.split_once('#') {
        Some((resources, unit)) => (resources, Some(unit)),
        None => (trimmed, None),
    };

    let (component, secondary_id, primary_id) = match resources.split_once('|') {
        Some((secondary, primary)) => (Component::ARA, Some(secondary), primary),
        None => (Component::KP, None, resources),
    };

    if primary_id.is_empty() || secondary_id.is_some_and(str::is_empty) {
        return Err(AddressError::MalformedLabel {
            label: label.to_string(),
        });
    }

    let (edge_num, test_id) = match unit {
        None => (UNKNOWN_EDGE_NUM, DEFAULT_TEST_ID),
        Some(unit) => {
            let (edge, test) = match unit.split_once('-') {
                Some((edge, test)) => (edge, test),
                None => (unit, ""),
            };
            let edge_num = if edge.is_empty() {
                UNKNOWN_EDGE_NUM
            } else {
                edge.parse::<i32>()
                    .map_err(|_| AddressError::MalformedLabel {
                        label: label.to_string(),
                    })?
            };
            let test_id = if test.is_empty() { DEFAULT_TEST_ID } else { test };
            (edge_num, test_id)
        }
    };

    let key = build_key(
        component,
        secondary_id,
        primary_id,
        Some(edge_num),
        Some(test_id),
    )?;

    Ok(UnitTestLabel {
        component,
        secondary_id: secondary_id.map(str::to_string),
        primary_id: primary_id.to_string(),
        edge_num,
        test_id: test_id.to_string(),
        key,
    })
}

/// Rejects key segments that are empty or could escape the run's namespace
/// when the key is turned into a filesystem path.
/// 拒绝为空的、或在键转换为文件系统路径时可能逃逸运行命名空间的键段。
fn validate_segment(segment: &str) -> Result<(), AddressError> {
    let invalid = segment.is_empty()
        || segment == ".."
        || segment == "."
        || segment.contains(['/', '\\', '\0']);

    if invalid {
        return Err(AddressError::InvalidSegment {
            segment: segment.to_string(),
        });
    }
    Ok(())
}

/// Validates a full slash-delimited document key, segment by segment.
/// Backends call this before deriving any path or record from a key that
/// crossed a process boundary.
///
/// 逐段验证一个以斜杠分隔的完整文档键。
/// 后端在依据跨越进程边界的键导出任何路径或记录之前调用它。
pub fn validate_key(key: &str) -> Result<(), AddressError> {
    if key.is_empty() {
        return Err(AddressError::InvalidSegment {
            segment: String::new(),
        });
    }
    for segment in key.split('/') {
        validate_segment(segment)?;
    }
    Ok(())
}
