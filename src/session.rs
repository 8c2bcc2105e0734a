//! Session Registry 模块 - 会话到二分查找实例的映射
//!
//! 每个会话（Telegram chat）最多持有一个活跃的 [`Bisector`]，
//! 由 registry 独占拥有。registry 是显式创建、显式传递的对象，
//! 内部用一把互斥锁保证同一会话的事件串行处理；锁内只做
//! 纯内存状态转移，所有 I/O（目录查询、消息发送）都在锁外。

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{bail, Result};
use chrono::NaiveDate;
use tracing::{debug, info};

use crate::bisect::{Bisector, CandidateImage};

/// 会话标识（Telegram chat id）
pub type ChatId = i64;

/// 一次判定事件的处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum VerdictOutcome {
    /// 该会话没有活跃的查找，事件被忽略
    NoSession,
    /// 查找继续，展示下一个探测点
    NextProbe(CandidateImage),
    /// 查找结束；culprit 为 None 表示整个范围内都没有肯定判定
    Finished { culprit: Option<NaiveDate> },
}

/// 会话注册表
pub struct SessionRegistry {
    sessions: Mutex<HashMap<ChatId, Bisector>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// 为会话开始一次新的二分查找，返回第一个探测点
    ///
    /// 候选列表按日期稳定升序排序后交给 Bisector。空列表是
    /// 显式错误，不创建会话。同一会话已有查找时直接替换，
    /// 旧查找被放弃且不产生结果。
    pub fn handle_start(
        &self,
        chat_id: ChatId,
        mut candidates: Vec<CandidateImage>,
    ) -> Result<CandidateImage> {
        if candidates.is_empty() {
            bail!("没有可用的影像，无法开始二分查找");
        }

        candidates.sort_by_key(|c| c.date);

        let bisector = Bisector::new(candidates);
        let probe = bisector.probe().clone();
        let total = bisector.remaining();

        let mut sessions = self.sessions.lock().unwrap();
        if sessions.insert(chat_id, bisector).is_some() {
            info!(chat_id, "Replacing active search with a new one");
        }
        info!(chat_id, candidates = total, "Search started");

        Ok(probe)
    }

    /// 把一次是/否判定送入会话的查找
    ///
    /// 没有活跃会话时静默忽略（事件与会话结束之间的正常竞争，
    /// 不是错误）。查找结束时移除会话并报告结果。
    pub fn handle_verdict(&self, chat_id: ChatId, verdict: bool) -> VerdictOutcome {
        let mut sessions = self.sessions.lock().unwrap();

        let Some(bisector) = sessions.get_mut(&chat_id) else {
            debug!(chat_id, verdict, "Verdict without an active session, ignoring");
            return VerdictOutcome::NoSession;
        };

        bisector.answer(verdict);

        if bisector.completed() {
            let culprit = bisector.culprit();
            sessions.remove(&chat_id);
            info!(chat_id, culprit = ?culprit, "Search finished");
            VerdictOutcome::Finished { culprit }
        } else {
            let probe = bisector.probe().clone();
            debug!(chat_id, remaining = bisector.remaining(), "Next probe");
            VerdictOutcome::NextProbe(probe)
        }
    }

    /// 会话是否有活跃的查找
    pub fn has_session(&self, chat_id: ChatId) -> bool {
        self.sessions.lock().unwrap().contains_key(&chat_id)
    }

    /// 活跃查找数量
    pub fn active_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn candidates(dates: &[&str]) -> Vec<CandidateImage> {
        dates
            .iter()
            .map(|d| CandidateImage::new(date(d), None))
            .collect()
    }

    #[test]
    fn test_empty_catalog_is_explicit_error() {
        let registry = SessionRegistry::new();
        let result = registry.handle_start(100, Vec::new());
        assert!(result.is_err());
        assert!(!registry.has_session(100));
    }

    #[test]
    fn test_start_sorts_unordered_candidates() {
        let registry = SessionRegistry::new();
        let probe = registry
            .handle_start(
                100,
                candidates(&["2020-05-01", "2020-01-01", "2020-03-01"]),
            )
            .unwrap();
        // 排序后中点是 03-01
        assert_eq!(probe.date, date("2020-03-01"));
    }

    #[test]
    fn test_verdict_without_session_is_noop() {
        let registry = SessionRegistry::new();
        assert_eq!(registry.handle_verdict(100, true), VerdictOutcome::NoSession);
    }

    #[test]
    fn test_full_search_removes_session() {
        let registry = SessionRegistry::new();
        registry
            .handle_start(
                100,
                candidates(&[
                    "2000-01-01",
                    "2000-02-01",
                    "2000-03-01",
                    "2000-04-01",
                    "2000-05-01",
                ]),
            )
            .unwrap();

        // 参照序列：true -> false -> false，结果 2000-03-01
        let outcome = registry.handle_verdict(100, true);
        assert!(matches!(outcome, VerdictOutcome::NextProbe(ref p) if p.date == date("2000-01-01")));

        let outcome = registry.handle_verdict(100, false);
        assert!(matches!(outcome, VerdictOutcome::NextProbe(ref p) if p.date == date("2000-02-01")));

        let outcome = registry.handle_verdict(100, false);
        assert_eq!(
            outcome,
            VerdictOutcome::Finished {
                culprit: Some(date("2000-03-01"))
            }
        );
        assert!(!registry.has_session(100));
    }

    #[test]
    fn test_all_negative_reports_no_culprit() {
        let registry = SessionRegistry::new();
        registry
            .handle_start(100, candidates(&["2000-01-01", "2000-02-01", "2000-03-01"]))
            .unwrap();

        let mut last = VerdictOutcome::NoSession;
        for _ in 0..4 {
            last = registry.handle_verdict(100, false);
            if matches!(last, VerdictOutcome::Finished { .. }) {
                break;
            }
        }
        assert_eq!(last, VerdictOutcome::Finished { culprit: None });
    }

    #[test]
    fn test_sessions_are_isolated() {
        let registry = SessionRegistry::new();
        registry
            .handle_start(1, candidates(&["2000-01-01", "2000-02-01", "2000-03-01"]))
            .unwrap();
        registry
            .handle_start(2, candidates(&["2010-01-01", "2010-02-01", "2010-03-01"]))
            .unwrap();

        // 会话 1 走完，不影响会话 2
        registry.handle_verdict(1, true);
        let _ = registry.handle_verdict(1, true);

        assert!(registry.has_session(2));

        let outcome = registry.handle_verdict(2, true);
        assert!(matches!(outcome, VerdictOutcome::NextProbe(ref p) if p.date == date("2010-01-01")));
    }

    #[test]
    fn test_restart_replaces_existing_search() {
        let registry = SessionRegistry::new();
        registry
            .handle_start(100, candidates(&["2000-01-01", "2000-02-01", "2000-03-01"]))
            .unwrap();
        registry.handle_verdict(100, true);

        // 重新 start：旧进度被丢弃
        let probe = registry
            .handle_start(100, candidates(&["2020-01-01", "2020-02-01", "2020-03-01"]))
            .unwrap();
        assert_eq!(probe.date, date("2020-02-01"));
        assert_eq!(registry.active_count(), 1);
    }
}
