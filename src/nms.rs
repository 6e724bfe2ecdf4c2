// 该文件是 Guobang （过磅） 项目的一部分。
// src/nms.rs - 非极大值抑制
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use tracing::debug;

use crate::model::Candidate;

/// 计算两个候选框的 IoU。并集面积为零时无定义，按 0 处理。
pub fn iou(a: &Candidate, b: &Candidate) -> f32 {
  let x1 = a.x1.max(b.x1);
  let y1 = a.y1.max(b.y1);
  let x2 = a.x2.min(b.x2);
  let y2 = a.y2.min(b.y2);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let union = a.area() + b.area() - intersection;

  if union > 0.0 {
    intersection / union
  } else {
    0.0
  }
}

/// 贪心非极大值抑制。
///
/// 按置信度稳定降序排序（同分保持原相对顺序），依次接受与所有
/// 已接受框的 IoU 不超过阈值的候选；iou > threshold 才触发抑制。
/// 返回按置信度降序的保留框。
pub fn suppress(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
  candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

  let mut accepted: Vec<Candidate> = Vec::with_capacity(candidates.len().min(16));
  for candidate in candidates {
    if accepted.iter().all(|kept| iou(kept, &candidate) <= iou_threshold) {
      accepted.push(candidate);
    }
  }

  debug!("NMS 保留 {} 个框", accepted.len());
  accepted
}
