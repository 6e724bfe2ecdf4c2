// 该文件是 Guobang （过磅） 项目的一部分。
// src/model.rs - 模型输出解码
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod anchor_block;
mod grid_plane;

pub use anchor_block::AnchorBlockDecoder;
pub use grid_plane::GridPlaneDecoder;

use thiserror::Error;

use crate::config::{DecoderKind, DetectorConfig};
use crate::frame::OutputTensor;

/// 候选框：解码空间内的角点坐标与置信度
#[derive(Debug, Clone)]
pub struct Candidate {
  pub x1: f32,
  pub y1: f32,
  pub x2: f32,
  pub y2: f32,
  pub score: f32,
  pub class_id: usize,
}

impl Candidate {
  pub fn width(&self) -> f32 {
    self.x2 - self.x1
  }

  pub fn height(&self) -> f32 {
    self.y2 - self.y1
  }

  pub fn area(&self) -> f32 {
    self.width().max(0.0) * self.height().max(0.0)
  }
}

/// 解码器输出的坐标空间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeSpace {
  /// 相对方形输入的单位坐标，[0, 1]
  Unit,
  /// 输入像素绝对坐标，[0, inputSize]
  InputPixels,
}

#[derive(Error, Debug)]
pub enum DecodeError {
  #[error("输出通道数不匹配: 期望 {expected} (= {anchors} 锚框 × {fields} 字段)，实际 {actual}")]
  ChannelMismatch {
    expected: usize,
    anchors: usize,
    fields: usize,
    actual: usize,
  },
}

/// 输出头解码器。两种头布局共用预处理、NMS 与坐标映射，
/// 仅解码算法按配置切换。
pub trait HeadDecoder {
  /// 解码输出张量为候选框列表
  fn decode(&self, output: &OutputTensor) -> Result<Vec<Candidate>, DecodeError>;

  /// 候选框坐标所在的空间
  fn space(&self) -> DecodeSpace;
}

/// 按配置构造解码器
pub fn build_decoder(config: &DetectorConfig) -> Box<dyn HeadDecoder + Send + Sync> {
  match config.decoder {
    DecoderKind::GridPlane => Box::new(GridPlaneDecoder::new(
      config.anchors.clone(),
      config.num_classes(),
      config.prob_threshold,
    )),
    DecoderKind::AnchorBlock => Box::new(AnchorBlockDecoder::new(
      config.anchors.clone(),
      config.num_classes(),
      config.conf_threshold,
      config.input_size,
    )),
  }
}

pub(crate) fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}

/// 数值稳定的 softmax：先减去最大值再取指数
pub(crate) fn softmax(logits: &[f32]) -> Vec<f32> {
  if logits.is_empty() {
    return Vec::new();
  }
  let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
  let mut exps = Vec::with_capacity(logits.len());
  let mut sum = 0.0f32;
  for &logit in logits {
    let e = (logit - max).exp();
    exps.push(e);
    sum += e;
  }
  for e in exps.iter_mut() {
    *e /= sum;
  }
  exps
}

/// 最大概率及其类别索引
pub(crate) fn best_class(probs: &[f32]) -> (usize, f32) {
  let mut best = 0usize;
  let mut max = f32::NEG_INFINITY;
  for (idx, &p) in probs.iter().enumerate() {
    if p > max {
      max = p;
      best = idx;
    }
  }
  (best, max)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sigmoid_at_zero_is_half() {
    assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
  }

  #[test]
  fn sigmoid_monotonic_and_bounded() {
    let mut prev = sigmoid(-20.0);
    assert!(prev > 0.0);
    for i in -19..=20 {
      let v = sigmoid(i as f32);
      assert!(v > prev);
      assert!(v > 0.0 && v < 1.0);
      prev = v;
    }
  }

  #[test]
  fn softmax_sums_to_one() {
    let probs = softmax(&[1.0, 2.0, 3.0, 4.0]);
    let sum: f32 = probs.iter().sum();
    assert!((sum - 1.0).abs() < 1e-5);
  }

  #[test]
  fn softmax_shift_invariant() {
    let a = softmax(&[1.0, 2.0, 3.0]);
    let b = softmax(&[1001.0, 1002.0, 1003.0]);
    for (x, y) in a.iter().zip(b.iter()) {
      assert!((x - y).abs() < 1e-5);
    }
  }

  #[test]
  fn softmax_survives_large_logits() {
    // 无稳定化时 exp(1000) 溢出为 inf
    let probs = softmax(&[1000.0, 999.0]);
    assert!(probs.iter().all(|p| p.is_finite()));
    assert!(probs[0] > probs[1]);
  }

  #[test]
  fn best_class_picks_argmax() {
    assert_eq!(best_class(&[0.1, 0.7, 0.2]), (1, 0.7));
  }
}
