//! Bisector 模块 - 二分查找状态机
//!
//! 对一个按日期升序排列的影像序列做二分查找，收敛到火灾损毁
//! 最早可见的日期。每次 `probe()` 给出当前中点影像，用户的
//! 是/否判断通过 `answer()` 收窄区间。
//!
//! 纯内存状态机，无 I/O：唯一的失败模式是契约违规
//! （空序列构造、在已完成的实例上继续操作），一律 fail fast。

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 一张候选影像
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateImage {
    /// 拍摄日期（天精度）
    pub date: NaiveDate,
    /// 目录方的场景 ID（可能缺失或不可靠）
    pub source_id: Option<String>,
}

impl CandidateImage {
    pub fn new(date: NaiveDate, source_id: Option<String>) -> Self {
        Self { date, source_id }
    }
}

/// 一次会话的二分查找引擎
///
/// 状态只有两个：Active（candidates 非空，completed = false）和
/// Completed（终态）。`candidates` 单调收缩，`culprit` 记录目前
/// 最优答案（最近一次判定为"是"的中点日期）。
#[derive(Debug, Clone)]
pub struct Bisector {
    candidates: Vec<CandidateImage>,
    culprit: Option<NaiveDate>,
    completed: bool,
}

impl Bisector {
    /// 用非空、按日期升序的候选序列构造
    ///
    /// 空序列是调用方的契约违规：空目录必须在构造前被拒绝。
    pub fn new(candidates: Vec<CandidateImage>) -> Self {
        assert!(
            !candidates.is_empty(),
            "Bisector requires a non-empty candidate list"
        );
        Self {
            candidates,
            culprit: None,
            completed: false,
        }
    }

    /// 当前中点影像，索引 (len - 1) / 2（偶数长度取低位中点）
    ///
    /// 纯读操作，在下一次 `answer()` 之前重复调用返回同一元素。
    pub fn probe(&self) -> &CandidateImage {
        assert!(!self.completed, "probe() called on a completed bisector");
        &self.candidates[(self.candidates.len() - 1) / 2]
    }

    /// 吸收一次判定，收窄区间
    ///
    /// - 判定为"是"：记录中点日期为 culprit，向更早的一半继续
    /// - 判定为"否"：向更晚的一半继续
    /// - 区间缩到单元素后，本次判定即为最后一步，进入终态
    ///
    /// 两个分支都丢弃中点本身。
    pub fn answer(&mut self, verdict: bool) {
        assert!(!self.completed, "answer() called on a completed bisector");

        let mid = (self.candidates.len() - 1) / 2;
        if verdict {
            self.culprit = Some(self.candidates[mid].date);
        }

        if self.candidates.len() <= 1 {
            self.completed = true;
            return;
        }

        if verdict {
            self.candidates.truncate(mid);
        } else {
            self.candidates.drain(..=mid);
        }

        // 肯定判定落在区间首元素时，更早的一半为空，答案已经确定
        if self.candidates.is_empty() {
            self.completed = true;
        }
    }

    /// 是否已终止
    pub fn completed(&self) -> bool {
        self.completed
    }

    /// 目前最优答案；全程没有肯定判定时为 None
    pub fn culprit(&self) -> Option<NaiveDate> {
        self.culprit
    }

    /// 剩余候选数量（用于进度显示）
    pub fn remaining(&self) -> usize {
        self.candidates.len()
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

    fn daily(n: u32) -> Vec<CandidateImage> {
        let base = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        (0..n)
            .map(|i| CandidateImage::new(base + chrono::Duration::days(i as i64), None))
            .collect()
    }

    #[test]
    fn test_probe_is_lower_biased_midpoint() {
        // 偶数长度取两个中点里较早的那个
        let b = Bisector::new(candidates(&["2000-01-01", "2000-02-01"]));
        assert_eq!(b.probe().date, date("2000-01-01"));

        let b = Bisector::new(candidates(&["2000-01-01", "2000-02-01", "2000-03-01"]));
        assert_eq!(b.probe().date, date("2000-02-01"));

        let b = Bisector::new(candidates(&[
            "2000-01-01",
            "2000-02-01",
            "2000-03-01",
            "2000-04-01",
        ]));
        assert_eq!(b.probe().date, date("2000-02-01"));
    }

    #[test]
    fn test_positive_on_range_head_completes() {
        // 区间 [d1, d2] 上中点是 d1；判定"是"后更早的一半为空，立即终止
        let mut b = Bisector::new(candidates(&["2000-01-01", "2000-02-01"]));
        assert_eq!(b.probe().date, date("2000-01-01"));
        b.answer(true);
        assert!(b.completed());
        assert_eq!(b.culprit(), Some(date("2000-01-01")));
    }

    #[test]
    fn test_probe_idempotent() {
        let b = Bisector::new(daily(9));
        let first = b.probe().clone();
        for _ in 0..5 {
            assert_eq!(*b.probe(), first);
        }
    }

    #[test]
    fn test_reference_sequence() {
        // 5 张月度影像，地面真值阈值 2000-03-01
        let mut b = Bisector::new(candidates(&[
            "2000-01-01",
            "2000-02-01",
            "2000-03-01",
            "2000-04-01",
            "2000-05-01",
        ]));

        // 中点 03-01，损毁可见 -> 向更早的一半收窄
        assert_eq!(b.probe().date, date("2000-03-01"));
        b.answer(true);
        assert_eq!(b.remaining(), 2);

        // 中点 01-01，早于阈值，不可见 -> 向更晚的一半
        assert_eq!(b.probe().date, date("2000-01-01"));
        b.answer(false);
        assert_eq!(b.remaining(), 1);

        // 单元素区间，任意判定后终止
        assert_eq!(b.probe().date, date("2000-02-01"));
        b.answer(false);
        assert!(b.completed());
        assert_eq!(b.culprit(), Some(date("2000-03-01")));
    }

    #[test]
    fn test_single_element_true() {
        let mut b = Bisector::new(candidates(&["2021-06-15"]));
        b.answer(true);
        assert!(b.completed());
        assert_eq!(b.culprit(), Some(date("2021-06-15")));
    }

    #[test]
    fn test_single_element_false() {
        let mut b = Bisector::new(candidates(&["2021-06-15"]));
        b.answer(false);
        assert!(b.completed());
        assert_eq!(b.culprit(), None);
    }

    #[test]
    fn test_all_false_finishes_without_culprit() {
        let mut b = Bisector::new(daily(12));
        while !b.completed() {
            b.answer(false);
        }
        assert_eq!(b.culprit(), None);
    }

    #[test]
    fn test_terminates_within_log_bound() {
        // 任意判定序列下，至多 ceil(log2(n)) + 1 步终止
        for n in 1..=64u32 {
            for pattern in [0b0000u32, 0b1111, 0b0101, 0b1010, 0b0011] {
                let mut b = Bisector::new(daily(n));
                let bound = (n as f64).log2().ceil() as u32 + 1;
                let mut steps = 0;
                while !b.completed() {
                    b.answer(pattern >> (steps % 5) & 1 == 1);
                    steps += 1;
                    assert!(steps <= bound, "n={} pattern={:b} steps={}", n, pattern, steps);
                }
            }
        }
    }

    #[test]
    fn test_monotone_convergence() {
        // 单调谓词（date >= d_k 时为真）下必须收敛到 d_k
        for n in 1..=40u32 {
            let list = daily(n);
            for k in 0..n as usize {
                let threshold = list[k].date;
                let mut b = Bisector::new(list.clone());
                while !b.completed() {
                    let verdict = b.probe().date >= threshold;
                    b.answer(verdict);
                }
                assert_eq!(b.culprit(), Some(threshold), "n={} k={}", n, k);
            }
        }
    }

    #[test]
    #[should_panic(expected = "non-empty")]
    fn test_empty_construction_panics() {
        let _ = Bisector::new(Vec::new());
    }

    #[test]
    #[should_panic(expected = "completed")]
    fn test_probe_after_completion_panics() {
        let mut b = Bisector::new(daily(1));
        b.answer(false);
        let _ = b.probe();
    }

    #[test]
    #[should_panic(expected = "completed")]
    fn test_answer_after_completion_panics() {
        let mut b = Bisector::new(daily(1));
        b.answer(true);
        b.answer(true);
    }
}
