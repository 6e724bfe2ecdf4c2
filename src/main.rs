// 该文件是 Guobang （过磅） 项目的一部分。
// src/main.rs - 项目主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use clap::Parser;
use tracing::{error, info};

use guobang::{
  FromUrl,
  config::DetectorConfig,
  engine::ReplayEngine,
  pipeline::{PlateCapture, PlateDetector},
  source::ImagePayload,
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("推理引擎: {}", args.engine);
  info!("输入数量: {}", args.inputs.len());

  let mut config = match &args.config {
    Some(path) => {
      let text = std::fs::read_to_string(path)
        .with_context(|| format!("无法读取配置文件: {}", path))?;
      serde_json::from_str::<DetectorConfig>(&text)
        .with_context(|| format!("配置文件解析失败: {}", path))?
    }
    None => DetectorConfig::default(),
  };
  if let Some(threshold) = args.prob_threshold {
    config.prob_threshold = threshold;
  }
  if let Some(threshold) = args.iou_threshold {
    config.iou_threshold = threshold;
  }

  let engine = ReplayEngine::from_url(&args.engine)?;
  let detector = PlateDetector::new(engine, config)?;

  // 单张失败不中断批量处理，逐张输出结构化结果
  let mut capture_index = 0u16;
  for input in &args.inputs {
    let document = match ImagePayload::from_url(input)
      .map_err(guobang::pipeline::DetectError::from)
      .and_then(|payload| detector.detect(&payload))
    {
      Ok(Some(capture)) => {
        capture_index += 1;
        let saved = match &args.output_dir {
          Some(dir) => {
            let path = save_capture(Path::new(dir), &capture, capture_index)?;
            Some(path.display().to_string())
          }
          None => None,
        };
        serde_json::json!({
          "status": "ok",
          "input": input.as_str(),
          "confidence": capture.confidence,
          "label": capture.label,
          "box": capture.bbox,
          "crop": saved,
        })
      }
      Ok(None) => serde_json::json!({
        "status": "empty",
        "input": input.as_str(),
      }),
      Err(err) => {
        error!("处理 {} 失败: {}", input, err);
        serde_json::json!({
          "status": "error",
          "input": input.as_str(),
          "kind": err.kind(),
          "message": err.to_string(),
        })
      }
    };
    println!("{}", serde_json::to_string(&document)?);
  }

  Ok(())
}

/// 按 年/月/日 目录落盘裁剪图
fn save_capture(directory: &Path, capture: &PlateCapture, index: u16) -> Result<PathBuf> {
  let now = Utc::now();
  let directory = directory
    .join(now.year().to_string())
    .join(format!("{:02}", now.month()))
    .join(format!("{:02}", now.day()));
  if !directory.exists() {
    std::fs::create_dir_all(&directory)?;
  }

  let path = directory.join(format!("{}-{:04X}.jpg", now.format("%H-%M-%S"), index));
  std::fs::write(&path, &capture.jpeg)
    .with_context(|| format!("无法写入裁剪图: {}", path.display()))?;
  info!("裁剪图已保存: {}", path.display());
  Ok(path)
}
