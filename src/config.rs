// 该文件是 Guobang （过磅） 项目的一部分。
// src/config.rs - 检测配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 解码器类型，对应两种模型输出头布局
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecoderKind {
  /// 单尺度多锚框网格头：所有通道按 H×W 平面连续排布，锚框以网格为单位
  GridPlane,
  /// 锚框分块头：每个锚框占用 numClasses+5 个连续平面，锚框以输入像素为单位
  AnchorBlock,
}

impl DecoderKind {
  /// 该头布局输出的最小成品框尺寸（宽, 高），与原始模型/相机标定绑定
  pub fn min_box(&self) -> (u32, u32) {
    match self {
      DecoderKind::GridPlane => (30, 15),
      DecoderKind::AnchorBlock => (10, 10),
    }
  }
}

/// 预处理缩放策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeStrategy {
  /// 直接拉伸到 inputSize × inputSize，不保持纵横比
  Stretch,
  /// 保持纵横比缩放后居中填充（letterbox），背景填零
  Letterbox,
}

/// 张量通道顺序，必须与模型训练时一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelOrder {
  Rgb,
  Bgr,
}

impl ChannelOrder {
  /// 平面 c 应取原始 RGB 像素的哪个分量
  pub fn component(&self, plane: usize) -> usize {
    match self {
      ChannelOrder::Rgb => plane,
      ChannelOrder::Bgr => 2 - plane,
    }
  }
}

/// 几何修复常量。
///
/// 回退值与最小尺寸是与特定模型/相机标定绑定的经验常量，
/// 不是通用真理，因此作为可配置的默认值暴露。
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryRepair {
  /// x2 ≤ x1 时的回退宽度（像素）
  pub fallback_width: u32,
  /// y2 ≤ y1 时的回退高度（像素）
  pub fallback_height: u32,
  /// 最小成品框宽度，None 时取解码器默认值
  pub min_width: Option<u32>,
  /// 最小成品框高度，None 时取解码器默认值
  pub min_height: Option<u32>,
  /// letterbox 坐标映射是否先去除填充偏移。
  /// 线上既有行为不去除（输出带偏差），下游依赖该输出，默认关闭。
  pub compensate_letterbox: bool,
}

impl Default for GeometryRepair {
  fn default() -> Self {
    GeometryRepair {
      fallback_width: 50,
      fallback_height: 20,
      min_width: None,
      min_height: None,
      compensate_letterbox: false,
    }
  }
}

impl GeometryRepair {
  pub fn min_box(&self, kind: DecoderKind) -> (u32, u32) {
    let (w, h) = kind.min_box();
    (self.min_width.unwrap_or(w), self.min_height.unwrap_or(h))
  }
}

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("输入尺寸无效: {0}")]
  InvalidInputSize(u32),
  #[error("阈值超出 [0, 1] 范围: {name} = {value}")]
  InvalidThreshold { name: &'static str, value: f32 },
  #[error("锚框列表为空")]
  EmptyAnchors,
}

/// 检测管线配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
  /// 模型输入边长（正方形）
  pub input_size: u32,
  /// GridPlane 头的全量得分阈值
  pub prob_threshold: f32,
  /// AnchorBlock 头的物体置信度阈值
  pub conf_threshold: f32,
  /// NMS IOU 阈值
  pub iou_threshold: f32,
  /// 锚框列表 [w, h]，单位由解码器类型决定
  pub anchors: Vec<[f32; 2]>,
  /// 类别标签
  pub labels: Vec<String>,
  /// 解码器类型
  pub decoder: DecoderKind,
  /// 缩放策略
  pub resize: ResizeStrategy,
  /// 通道顺序
  pub channel_order: ChannelOrder,
  /// 几何修复常量
  pub geometry: GeometryRepair,
}

impl Default for DetectorConfig {
  fn default() -> Self {
    DetectorConfig {
      input_size: 416,
      prob_threshold: 0.3,
      conf_threshold: 0.5,
      iou_threshold: 0.45,
      // tiny-yolo v2 风格默认锚框（网格单位）
      anchors: vec![
        [1.08, 1.19],
        [3.42, 4.41],
        [6.63, 11.38],
        [9.42, 5.11],
        [16.62, 10.52],
      ],
      labels: vec!["plate".to_string()],
      decoder: DecoderKind::GridPlane,
      resize: ResizeStrategy::Stretch,
      channel_order: ChannelOrder::Rgb,
      geometry: GeometryRepair::default(),
    }
  }
}

impl DetectorConfig {
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.input_size == 0 {
      return Err(ConfigError::InvalidInputSize(self.input_size));
    }
    for (name, value) in [
      ("prob_threshold", self.prob_threshold),
      ("conf_threshold", self.conf_threshold),
      ("iou_threshold", self.iou_threshold),
    ] {
      if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::InvalidThreshold { name, value });
      }
    }
    if self.anchors.is_empty() {
      return Err(ConfigError::EmptyAnchors);
    }
    Ok(())
  }

  /// 类别数，标签表为空时视为纯物体检测器
  pub fn num_classes(&self) -> usize {
    self.labels.len()
  }

  pub fn label(&self, class_id: usize) -> &str {
    self.labels.get(class_id).map(String::as_str).unwrap_or("unknown")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_config_is_valid() {
    assert!(DetectorConfig::default().validate().is_ok());
  }

  #[test]
  fn rejects_out_of_range_threshold() {
    let config = DetectorConfig {
      iou_threshold: 1.5,
      ..DetectorConfig::default()
    };
    assert!(config.validate().is_err());
  }

  #[test]
  fn rejects_empty_anchors() {
    let config = DetectorConfig {
      anchors: vec![],
      ..DetectorConfig::default()
    };
    assert!(matches!(config.validate(), Err(ConfigError::EmptyAnchors)));
  }

  #[test]
  fn min_box_falls_back_to_decoder_default() {
    let geometry = GeometryRepair::default();
    assert_eq!(geometry.min_box(DecoderKind::GridPlane), (30, 15));
    assert_eq!(geometry.min_box(DecoderKind::AnchorBlock), (10, 10));

    let overridden = GeometryRepair {
      min_width: Some(64),
      ..GeometryRepair::default()
    };
    assert_eq!(overridden.min_box(DecoderKind::AnchorBlock), (64, 10));
  }

  #[test]
  fn channel_order_component_mapping() {
    assert_eq!(ChannelOrder::Rgb.component(0), 0);
    assert_eq!(ChannelOrder::Bgr.component(0), 2);
    assert_eq!(ChannelOrder::Bgr.component(1), 1);
    assert_eq!(ChannelOrder::Bgr.component(2), 0);
  }

  #[test]
  fn config_deserializes_with_defaults() {
    let config: DetectorConfig = serde_json::from_str(r#"{ "input_size": 320 }"#).unwrap();
    assert_eq!(config.input_size, 320);
    assert_eq!(config.decoder, DecoderKind::GridPlane);
    assert_eq!(config.geometry.fallback_width, 50);
  }
}
