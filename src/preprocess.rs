// 该文件是 Guobang （过磅） 项目的一部分。
// src/preprocess.rs - 图像预处理（缩放 + 平面化归一）
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
use thiserror::Error;
use tracing::debug;

use crate::config::{ChannelOrder, ResizeStrategy};
use crate::frame::PlanarTensor;

#[derive(Error, Debug)]
pub enum PreprocessError {
  #[error("图像尺寸为零: {width}x{height}")]
  ZeroDimensions { width: u32, height: u32 },
}

/// 预处理时施加的几何变换，坐标映射阶段据此回算原图坐标
#[derive(Debug, Clone, Copy)]
pub enum ResizeTransform {
  /// 直接拉伸，纵横比被丢弃
  Stretch { orig_w: u32, orig_h: u32 },
  /// 保持纵横比缩放并居中填充
  Letterbox {
    orig_w: u32,
    orig_h: u32,
    scale: f32,
    pad_x: u32,
    pad_y: u32,
  },
}

impl ResizeTransform {
  pub fn original_dims(&self) -> (u32, u32) {
    match *self {
      ResizeTransform::Stretch { orig_w, orig_h } => (orig_w, orig_h),
      ResizeTransform::Letterbox { orig_w, orig_h, .. } => (orig_w, orig_h),
    }
  }
}

/// 将原始图像转换为模型输入张量
pub struct Preprocessor {
  input_size: u32,
  strategy: ResizeStrategy,
  channel_order: ChannelOrder,
}

impl Preprocessor {
  pub fn new(input_size: u32, strategy: ResizeStrategy, channel_order: ChannelOrder) -> Self {
    Preprocessor {
      input_size,
      strategy,
      channel_order,
    }
  }

  /// 缩放并平面化，返回归一化张量与所施加的几何变换
  pub fn run(&self, image: &RgbImage) -> Result<(PlanarTensor, ResizeTransform), PreprocessError> {
    let (orig_w, orig_h) = image.dimensions();
    if orig_w == 0 || orig_h == 0 {
      return Err(PreprocessError::ZeroDimensions {
        width: orig_w,
        height: orig_h,
      });
    }

    let size = self.input_size;
    match self.strategy {
      ResizeStrategy::Stretch => {
        debug!("拉伸缩放: {}x{} -> {}x{}", orig_w, orig_h, size, size);
        let resized =
          image::imageops::resize(image, size, size, image::imageops::FilterType::Triangle);
        let mut tensor = PlanarTensor::zeros(size);
        fill_planes(&mut tensor, &resized, 0, 0, self.channel_order);
        Ok((tensor, ResizeTransform::Stretch { orig_w, orig_h }))
      }
      ResizeStrategy::Letterbox => {
        let scale = (size as f32 / orig_w as f32).min(size as f32 / orig_h as f32);
        let new_w = ((orig_w as f32) * scale).round().clamp(1.0, size as f32) as u32;
        let new_h = ((orig_h as f32) * scale).round().clamp(1.0, size as f32) as u32;
        let pad_x = (size - new_w) / 2;
        let pad_y = (size - new_h) / 2;
        debug!(
          "letterbox 缩放: {}x{} -> {}x{}, 填充 ({}, {})",
          orig_w, orig_h, new_w, new_h, pad_x, pad_y
        );

        let resized =
          image::imageops::resize(image, new_w, new_h, image::imageops::FilterType::Triangle);
        // 画布填零，缩放结果居中
        let mut tensor = PlanarTensor::zeros(size);
        fill_planes(&mut tensor, &resized, pad_x, pad_y, self.channel_order);
        Ok((
          tensor,
          ResizeTransform::Letterbox {
            orig_w,
            orig_h,
            scale,
            pad_x,
            pad_y,
          },
        ))
      }
    }
  }
}

/// 将交错的 RGB 字节写入平面张量，逐字节除以 255
fn fill_planes(
  tensor: &mut PlanarTensor,
  image: &RgbImage,
  offset_x: u32,
  offset_y: u32,
  order: ChannelOrder,
) {
  let side = tensor.side() as usize;
  let plane = tensor.plane_len();
  let (w, h) = image.dimensions();
  let raw = image.as_raw();
  let slice = tensor.as_mut_slice();

  for c in 0..3 {
    let component = order.component(c);
    for y in 0..h as usize {
      let row = (y + offset_y as usize) * side + offset_x as usize;
      for x in 0..w as usize {
        let byte = raw[(y * w as usize + x) * 3 + component];
        slice[c * plane + row + x] = byte as f32 / 255.0;
      }
    }
  }
}
