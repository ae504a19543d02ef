//! 生产者与消费者约定的任务标签与队列名称。

/// 默认任务队列名称
pub const DEFAULT_TASK_QUEUE: &str = "task_queue";

/// 合并读取路径使用的历史标签（旧版后端对所有读操作统一打此标签）
pub const GET_CALL: &str = "get-call";
/// 创建记录
pub const POST_CALL: &str = "post-call";
/// 列出全部记录
pub const GET_ALL: &str = "getall";
/// 按键读取单条记录
pub const GET_ONE: &str = "getone";
/// 字段级更新
pub const UPDATE: &str = "update";

/// 线上约定的全部标签
pub const KNOWN_LABELS: [&str; 5] = [GET_CALL, POST_CALL, GET_ALL, GET_ONE, UPDATE];

/// 标签是否属于约定词表
pub fn is_known(label: &str) -> bool {
    KNOWN_LABELS.contains(&label)
}
