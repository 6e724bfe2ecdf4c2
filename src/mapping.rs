// 该文件是 Guobang （过磅） 项目的一部分。
// src/mapping.rs - 候选框坐标回算原图
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{DecoderKind, GeometryRepair};
use crate::model::{Candidate, DecodeSpace};
use crate::preprocess::ResizeTransform;

/// 原图像素坐标系内的成品框。
///
/// 不变量：0 ≤ x1 < x2 < origW，0 ≤ y1 < y2 < origH。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelBox {
  pub x1: u32,
  pub y1: u32,
  pub x2: u32,
  pub y2: u32,
}

impl PixelBox {
  pub fn width(&self) -> u32 {
    self.x2 - self.x1
  }

  pub fn height(&self) -> u32 {
    self.y2 - self.y1
  }
}

/// 单精度乘积会让 0.35×600 这类值落在 209.99999…，
/// 取整前加一个亚像素容差
const FLOOR_EPS: f64 = 1e-4;

fn floor_px(v: f32) -> i64 {
  ((v as f64) + FLOOR_EPS).floor() as i64
}

/// 将解码空间内的候选框映射回原图像素坐标，并做几何修复。
///
/// letterbox 路径默认直接按 orig/input 比例缩放，不先去除填充
/// 偏移。这在几何上与预处理不一致（结果偏向画面中部），但下游
/// 依赖该输出，须经 `compensate_letterbox` 显式开启修正路径。
pub fn map_to_original(
  candidate: &Candidate,
  space: DecodeSpace,
  transform: &ResizeTransform,
  input_size: u32,
  geometry: &GeometryRepair,
  kind: DecoderKind,
) -> PixelBox {
  let (orig_w, orig_h) = transform.original_dims();
  let size = input_size as f32;

  // 统一成输入像素坐标
  let (ix1, iy1, ix2, iy2) = match space {
    DecodeSpace::Unit => (
      candidate.x1 * size,
      candidate.y1 * size,
      candidate.x2 * size,
      candidate.y2 * size,
    ),
    DecodeSpace::InputPixels => (candidate.x1, candidate.y1, candidate.x2, candidate.y2),
  };

  // 输入像素 → 原图像素
  let (fx1, fy1, fx2, fy2) = match *transform {
    ResizeTransform::Stretch { orig_w, orig_h } => {
      let scale_x = orig_w as f32 / size;
      let scale_y = orig_h as f32 / size;
      (ix1 * scale_x, iy1 * scale_y, ix2 * scale_x, iy2 * scale_y)
    }
    ResizeTransform::Letterbox {
      orig_w,
      orig_h,
      scale,
      pad_x,
      pad_y,
    } => {
      if geometry.compensate_letterbox {
        (
          (ix1 - pad_x as f32) / scale,
          (iy1 - pad_y as f32) / scale,
          (ix2 - pad_x as f32) / scale,
          (iy2 - pad_y as f32) / scale,
        )
      } else {
        debug!("letterbox 坐标直接按比例缩放，未去除填充偏移");
        let scale_x = orig_w as f32 / size;
        let scale_y = orig_h as f32 / size;
        (ix1 * scale_x, iy1 * scale_y, ix2 * scale_x, iy2 * scale_y)
      }
    }
  };

  let mut x1 = floor_px(fx1);
  let mut y1 = floor_px(fy1);
  let mut x2 = floor_px(fx2);
  let mut y2 = floor_px(fy2);

  // 退化框修复：固定像素回退值
  if x2 <= x1 {
    x2 = x1 + geometry.fallback_width as i64;
  }
  if y2 <= y1 {
    y2 = y1 + geometry.fallback_height as i64;
  }

  let max_x = orig_w as i64 - 1;
  let max_y = orig_h as i64 - 1;
  x1 = x1.clamp(0, max_x);
  y1 = y1.clamp(0, max_y);
  x2 = x2.clamp(0, max_x);
  y2 = y2.clamp(0, max_y);

  // 最小成品框尺寸
  let (min_w, min_h) = geometry.min_box(kind);
  if x2 - x1 < min_w as i64 {
    x2 = (x1 + min_w as i64).min(max_x);
    if x2 - x1 < min_w as i64 {
      x1 = (x2 - min_w as i64).max(0);
    }
  }
  if y2 - y1 < min_h as i64 {
    y2 = (y1 + min_h as i64).min(max_y);
    if y2 - y1 < min_h as i64 {
      y1 = (y2 - min_h as i64).max(0);
    }
  }

  // 极端小图下保证 x1 < x2 仍成立
  if x2 <= x1 {
    x1 = (x2 - 1).max(0);
    x2 = x1 + 1;
  }
  if y2 <= y1 {
    y1 = (y2 - 1).max(0);
    y2 = y1 + 1;
  }

  PixelBox {
    x1: x1 as u32,
    y1: y1 as u32,
    x2: x2 as u32,
    y2: y2 as u32,
  }
}
