// 该文件是 Guobang （过磅） 项目的一部分。
// src/model/grid_plane.rs - 单尺度多锚框网格头解码
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

/// 单尺度多锚框网格头。
///
/// 输出张量 [1, A×(5+nc), H, W]，所有通道按完整 H×W 平面排布，
/// 锚框 a 的字段 f 位于通道 a×(5+nc)+f。锚框尺寸以网格为单位。
/// 候选框坐标为相对方形输入的单位坐标，仅在完整得分
/// （objectness × 最优类别概率）超过阈值后才发射。
pub struct GridPlaneDecoder {
  anchors: Vec<[f32; 2]>,
  num_classes: usize,
  prob_threshold: f32,
}

impl GridPlaneDecoder {
  pub fn new(anchors: Vec<[f32; 2]>, num_classes: usize, prob_threshold: f32) -> Self {
    GridPlaneDecoder {
      anchors,
      num_classes,
      prob_threshold,
    }
  }

  fn fields(&self) -> usize {
    BOX_FIELDS + self.num_classes
  }
}

impl HeadDecoder for GridPlaneDecoder {
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
    let mut candidates = Vec::new();

    for gy in 0..grid_h {
      for gx in 0..grid_w {
        for (a, anchor) in self.anchors.iter().enumerate() {
          let base = a * self.fields();
          let tx = output.at(base, gy, gx);
          let ty = output.at(base + 1, gy, gx);
          let tw = output.at(base + 2, gy, gx);
          let th = output.at(base + 3, gy, gx);
          let tobj = output.at(base + 4, gy, gx);

          let objectness = sigmoid(tobj);

          let (class_id, class_prob) = if self.num_classes == 0 {
            // 纯物体检测器：类别概率视为 1
            (0, 1.0)
          } else {
            let logits: Vec<f32> = (0..self.num_classes)
              .map(|c| output.at(base + BOX_FIELDS + c, gy, gx))
              .collect();
            best_class(&softmax(&logits))
          };

          let score = class_prob * objectness;
          if score <= self.prob_threshold {
            continue;
          }

          let x = (sigmoid(tx) + gx as f32) / grid_w as f32;
          let y = (sigmoid(ty) + gy as f32) / grid_h as f32;
          let w = tw.exp() * anchor[0] / grid_w as f32;
          let h = th.exp() * anchor[1] / grid_h as f32;

          candidates.push(Candidate {
            x1: x - w / 2.0,
            y1: y - h / 2.0,
            x2: x + w / 2.0,
            y2: y + h / 2.0,
            score,
            class_id,
          });
        }
      }
    }

    debug!("网格头解码出 {} 个候选框", candidates.len());
    Ok(candidates)
  }

  fn space(&self) -> DecodeSpace {
    DecodeSpace::Unit
  }
}
