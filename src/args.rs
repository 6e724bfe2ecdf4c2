// 该文件是 Guobang （过磅） 项目的一部分。
// src/args.rs - 项目参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use clap::Parser;
use url::Url;

/// Guobang 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 推理引擎 URL
  /// 支持格式:
  /// - 回放引擎: replay:///path/to/output.bin?c=30&h=13&w=13
  #[arg(long, value_name = "ENGINE")]
  pub engine: Url,

  /// 输入图像来源，可重复指定
  /// 支持格式:
  /// - 图片文件: image:///path/to/capture.jpg
  /// - 内嵌负载: data:image/jpeg;base64,...
  #[arg(long = "input", value_name = "SOURCE", required = true)]
  pub inputs: Vec<Url>,

  /// 检测配置 JSON 文件路径，缺省时使用内置默认配置
  #[arg(long, value_name = "FILE")]
  pub config: Option<String>,

  /// 裁剪结果输出目录（按 年/月/日 分层），缺省时不落盘
  #[arg(long, value_name = "DIR")]
  pub output_dir: Option<String>,

  /// 覆盖配置中的得分阈值 (0.0 - 1.0)
  #[arg(long, value_name = "THRESHOLD")]
  pub prob_threshold: Option<f32>,

  /// 覆盖配置中的 NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, value_name = "THRESHOLD")]
  pub iou_threshold: Option<f32>,
}
