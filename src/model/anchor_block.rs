// 该文件是 Guobang （过磅） 项目的一部分。
// src/model/anchor_block.rs - 锚框分块头解码
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use tracing::debug;

use crate::frame::OutputTensor;
use crate::model::{Candidate, DecodeError, DecodeSpace, HeadDecoder, best_class, sigmoid, softmax};

/// 框参数字段数：tx, ty, tw, th, tobj
const BOX_FIELDS: usize = 5;

/// 锚框分块头（YOLO-v3 风格）。
///
/// 输出张量 [1, A×(nc+5), H, W]，每个锚框占用 nc+5 个连续平面。
/// 锚框尺寸以输入像素为单位，候选框坐标为输入像素绝对角点。
///
/// 与网格头不同：objectness 低于阈值时在计算类别得分之前
/// 直接跳过，通过门限的候选也不再按完整得分二次过滤，
/// 两种头的输出集合因此不同。
pub struct AnchorBlockDecoder {
  anchors: Vec<[f32; 2]>,
  num_classes: usize,
  conf_threshold: f32,
  input_size: u32,
}

impl AnchorBlockDecoder {
  pub fn new(
    anchors: Vec<[f32; 2]>,
    num_classes: usize,
    conf_threshold: f32,
    input_size: u32,
  ) -> Self {
    AnchorBlockDecoder {
      anchors,
      num_classes,
      conf_threshold,
      input_size,
    }
  }

  fn fields(&self) -> usize {
    self.num_classes + BOX_FIELDS
  }
}

impl HeadDecoder for AnchorBlockDecoder {
  fn decode(&self, output: &OutputTensor) -> Result<Vec<Candidate>, DecodeError> {
    let expected = self.anchors.len() * self.fields();
    if output.channels() != expected {
      return Err(DecodeError::ChannelMismatch {
        expected,
        anchors: self.anchors.len(),
        fields: self.fields(),
        actual: output.channels(),
      });
    }

    let grid_h = output.height();
    let grid_w = output.width();
    let size = self.input_size as f32;
    let mut candidates = Vec::new();

    for gy in 0..grid_h {
      for gx in 0..grid_w {
        for (a, anchor) in self.anchors.iter().enumerate() {
          let base = a * self.fields();
          let objectness = sigmoid(output.at(base + 4, gy, gx));
          // 门限在类别计算之前，省掉绝大多数单元的 softmax
          if objectness < self.conf_threshold {
            continue;
          }

          let (class_id, class_prob) = if self.num_classes == 0 {
            (0, 1.0)
          } else {
            let logits: Vec<f32> = (0..self.num_classes)
              .map(|c| output.at(base + BOX_FIELDS + c, gy, gx))
              .collect();
            best_class(&softmax(&logits))
          };

          let tx = output.at(base, gy, gx);
          let ty = output.at(base + 1, gy, gx);
          let tw = output.at(base + 2, gy, gx);
          let th = output.at(base + 3, gy, gx);

          let bx = (sigmoid(tx) + gx as f32) / grid_w as f32;
          let by = (sigmoid(ty) + gy as f32) / grid_h as f32;
          let bw = tw.exp() * anchor[0] / size;
          let bh = th.exp() * anchor[1] / size;

          candidates.push(Candidate {
            x1: (bx - bw / 2.0) * size,
            y1: (by - bh / 2.0) * size,
            x2: (bx + bw / 2.0) * size,
            y2: (by + bh / 2.0) * size,
            score: objectness * class_prob,
            class_id,
          });
        }
      }
    }

    debug!("分块头解码出 {} 个候选框", candidates.len());
    Ok(candidates)
  }

  fn space(&self) -> DecodeSpace {
    DecodeSpace::InputPixels
  }
}
