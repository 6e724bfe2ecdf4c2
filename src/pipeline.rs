// 该文件是 Guobang （过磅） 项目的一部分。
// src/pipeline.rs - 检测管线
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use image::RgbImage;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{ConfigError, DetectorConfig};
use crate::crop::{self, CropError};
use crate::engine::{EngineError, InferenceEngine};
use crate::frame::TensorShapeError;
use crate::mapping::{self, PixelBox};
use crate::model::{self, DecodeError, HeadDecoder};
use crate::nms;
use crate::preprocess::{PreprocessError, Preprocessor};
use crate::source::{ImagePayload, SourceError};

/// 单次检测请求的终止性错误。
///
/// “未检测到目标”不是错误，以 `Ok(None)` 表达；批量调用方据此
/// 可以在单张失败后继续处理后续图像。
#[derive(Error, Debug)]
pub enum DetectError {
  #[error("无效图像: {0}")]
  InvalidImage(String),
  #[error("推理引擎尚未就绪")]
  ModelNotReady,
  #[error("推理失败: {0}")]
  Inference(String),
  #[error("裁剪越界: {0}")]
  CropOutOfBounds(String),
}

impl DetectError {
  /// 结构化结果里的错误类别标识
  pub fn kind(&self) -> &'static str {
    match self {
      DetectError::InvalidImage(_) => "invalid_image",
      DetectError::ModelNotReady => "model_not_ready",
      DetectError::Inference(_) => "inference_failure",
      DetectError::CropOutOfBounds(_) => "crop_out_of_bounds",
    }
  }
}

impl From<SourceError> for DetectError {
  fn from(err: SourceError) -> Self {
    DetectError::InvalidImage(err.to_string())
  }
}

impl From<PreprocessError> for DetectError {
  fn from(err: PreprocessError) -> Self {
    DetectError::InvalidImage(err.to_string())
  }
}

impl From<EngineError> for DetectError {
  fn from(err: EngineError) -> Self {
    match err {
      EngineError::NotReady => DetectError::ModelNotReady,
      EngineError::Failed(e) => DetectError::Inference(e.to_string()),
    }
  }
}

impl From<DecodeError> for DetectError {
  fn from(err: DecodeError) -> Self {
    DetectError::Inference(err.to_string())
  }
}

impl From<TensorShapeError> for DetectError {
  fn from(err: TensorShapeError) -> Self {
    DetectError::Inference(err.to_string())
  }
}

impl From<CropError> for DetectError {
  fn from(err: CropError) -> Self {
    match err {
      CropError::OutOfBounds { .. } => DetectError::CropOutOfBounds(err.to_string()),
      CropError::Encode(e) => DetectError::InvalidImage(e.to_string()),
    }
  }
}

/// 检测成功的成品：置信度、标签、原图坐标框与裁剪图
#[derive(Debug, Clone, Serialize)]
pub struct PlateCapture {
  pub confidence: f32,
  pub label: String,
  pub bbox: PixelBox,
  #[serde(skip)]
  pub jpeg: Vec<u8>,
}

/// 车牌检测管线。
///
/// 引擎在构造时注入；除引擎外的所有阶段都是纯同步计算，
/// 请求之间互不共享可变状态。
pub struct PlateDetector<E> {
  engine: E,
  config: DetectorConfig,
  preprocessor: Preprocessor,
  decoder: Box<dyn HeadDecoder + Send + Sync>,
}

impl<E: InferenceEngine> PlateDetector<E> {
  pub fn new(engine: E, config: DetectorConfig) -> Result<Self, ConfigError> {
    config.validate()?;
    let preprocessor = Preprocessor::new(config.input_size, config.resize, config.channel_order);
    let decoder = model::build_decoder(&config);
    Ok(PlateDetector {
      engine,
      config,
      preprocessor,
      decoder,
    })
  }

  pub fn config(&self) -> &DetectorConfig {
    &self.config
  }

  /// 对一个图像来源执行完整检测
  pub fn detect(&self, payload: &ImagePayload) -> Result<Option<PlateCapture>, DetectError> {
    let image = payload.decode()?;
    self.detect_image(&image)
  }

  /// 对已解码的 RGB 图像执行检测
  pub fn detect_image(&self, image: &RgbImage) -> Result<Option<PlateCapture>, DetectError> {
    let (tensor, transform) = self.preprocessor.run(image)?;

    let now = std::time::Instant::now();
    let output = self.engine.run(&tensor)?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());

    let candidates = self.decoder.decode(&output)?;
    debug!("解码出 {} 个候选框", candidates.len());

    let survivors = nms::suppress(candidates, self.config.iou_threshold);
    let Some(best) = survivors.first() else {
      info!("未检测到目标");
      return Ok(None);
    };
    debug!("最优候选: 得分 {:.4}, 类别 {}", best.score, best.class_id);

    let bbox = mapping::map_to_original(
      best,
      self.decoder.space(),
      &transform,
      self.config.input_size,
      &self.config.geometry,
      self.config.decoder,
    );

    let jpeg = crop::crop_encode(image, &bbox)?;
    info!(
      "检测完成: {} {:.2}% at ({}, {})-({}, {})",
      self.config.label(best.class_id),
      best.score * 100.0,
      bbox.x1,
      bbox.y1,
      bbox.x2,
      bbox.y2
    );

    Ok(Some(PlateCapture {
      confidence: best.score,
      label: self.config.label(best.class_id).to_string(),
      bbox,
      jpeg,
    }))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::{OutputTensor, PlanarTensor};

  struct FixedEngine {
    output: OutputTensor,
  }

  impl InferenceEngine for FixedEngine {
    fn run(&self, _input: &PlanarTensor) -> Result<OutputTensor, EngineError> {
      Ok(self.output.clone())
    }
  }

  struct NotReadyEngine;

  impl InferenceEngine for NotReadyEngine {
    fn run(&self, _input: &PlanarTensor) -> Result<OutputTensor, EngineError> {
      Err(EngineError::NotReady)
    }
  }

  fn cold_tensor(grid: usize) -> OutputTensor {
    // 单锚框单类别头，所有 objectness 压满负
    let mut data = vec![0.0f32; 6 * grid * grid];
    for i in 0..grid * grid {
      data[4 * grid * grid + i] = -10.0;
    }
    OutputTensor::new(data, 6, grid, grid).unwrap()
  }

  fn single_class_config() -> DetectorConfig {
    DetectorConfig {
      anchors: vec![[2.0, 1.0]],
      labels: vec!["plate".to_string()],
      ..DetectorConfig::default()
    }
  }

  #[test]
  fn empty_candidates_is_no_detection_not_error() {
    let detector = PlateDetector::new(
      FixedEngine {
        output: cold_tensor(13),
      },
      single_class_config(),
    )
    .unwrap();
    let image = RgbImage::new(64, 48);
    let result = detector.detect_image(&image).unwrap();
    assert!(result.is_none());
  }

  #[test]
  fn not_ready_engine_maps_to_model_not_ready() {
    let detector = PlateDetector::new(NotReadyEngine, single_class_config()).unwrap();
    let image = RgbImage::new(64, 48);
    let err = detector.detect_image(&image).unwrap_err();
    assert!(matches!(err, DetectError::ModelNotReady));
    assert_eq!(err.kind(), "model_not_ready");
  }

  #[test]
  fn malformed_output_maps_to_inference_failure() {
    // 通道数与单锚框单类别头(6)不符
    let output = OutputTensor::new(vec![0.0; 9 * 4], 9, 2, 2).unwrap();
    let detector =
      PlateDetector::new(FixedEngine { output }, single_class_config()).unwrap();
    let image = RgbImage::new(64, 48);
    let err = detector.detect_image(&image).unwrap_err();
    assert!(matches!(err, DetectError::Inference(_)));
    assert_eq!(err.kind(), "inference_failure");
  }

  #[test]
  fn invalid_config_rejected_at_construction() {
    let config = DetectorConfig {
      anchors: vec![],
      ..DetectorConfig::default()
    };
    assert!(PlateDetector::new(NotReadyEngine, config).is_err());
  }

  #[test]
  fn error_kinds_are_stable() {
    assert_eq!(
      DetectError::InvalidImage("x".into()).kind(),
      "invalid_image"
    );
    assert_eq!(
      DetectError::CropOutOfBounds("x".into()).kind(),
      "crop_out_of_bounds"
    );
  }
}
