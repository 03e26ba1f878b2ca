use nanoid::nanoid;

// ==========================================
// ID 生成工具 (Identity Utilities)
// ==========================================

/// 生成事件 ID (NanoID)
///
/// - 默认长度: 21 字符
/// - 仅用于日志与回复关联，不参与排序。
#[inline]
pub fn new_event_id() -> String {
    nanoid!()
}

/// 获取当前机器的主机名
pub fn get_hostname() -> String {
    hostname::get()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "node".to_string())
}

/// 默认调度器实例名: `hostname-随机串` (如 `server01-a1b2c`)
pub fn default_scheduler_name() -> String {
    let random_suffix = nanoid!(5, &nanoid::alphabet::SAFE);
    format!("{}-{}", get_hostname(), random_suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_ids_are_unique() {
        let a = new_event_id();
        let b = new_event_id();
        assert_eq!(a.len(), 21);
        assert_ne!(a, b);
    }

    #[test]
    fn scheduler_name_has_suffix() {
        let host = get_hostname();
        let name = default_scheduler_name();
        assert!(name.starts_with(&format!("{}-", host)));
        assert_eq!(name.len(), host.len() + 6);
    }
}
