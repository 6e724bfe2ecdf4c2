// 该文件是 Guobang （过磅） 项目的一部分。
// src/crop.rs - 成品框裁剪与再编码
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

use crate::mapping::PixelBox;

#[derive(Error, Debug)]
pub enum CropError {
  #[error("裁剪越界: 框 ({x1},{y1})-({x2},{y2}) 超出图像 {width}x{height}")]
  OutOfBounds {
    x1: u32,
    y1: u32,
    x2: u32,
    y2: u32,
    width: u32,
    height: u32,
  },
  #[error("图像编码错误: {0}")]
  Encode(#[from] image::ImageError),
}

/// 从原图裁出成品框并编码为 JPEG 字节流。
///
/// 坐标映射阶段已把框夹进图像范围，这里的越界分支理应不可达，
/// 但仍然显式校验。
pub fn crop_encode(image: &RgbImage, pixel_box: &PixelBox) -> Result<Vec<u8>, CropError> {
  let (width, height) = image.dimensions();
  if pixel_box.x2 >= width || pixel_box.y2 >= height || pixel_box.x1 >= pixel_box.x2
    || pixel_box.y1 >= pixel_box.y2
  {
    return Err(CropError::OutOfBounds {
      x1: pixel_box.x1,
      y1: pixel_box.y1,
      x2: pixel_box.x2,
      y2: pixel_box.y2,
      width,
      height,
    });
  }

  let cropped = image::imageops::crop_imm(
    image,
    pixel_box.x1,
    pixel_box.y1,
    pixel_box.width(),
    pixel_box.height(),
  )
  .to_image();

  let mut bytes = Vec::new();
  cropped.write_to(
    &mut std::io::Cursor::new(&mut bytes),
    image::ImageFormat::Jpeg,
  )?;
  debug!(
    "裁剪 {}x{} 区域，JPEG {} 字节",
    pixel_box.width(),
    pixel_box.height(),
    bytes.len()
  );
  Ok(bytes)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn crops_expected_region() {
    // 左半红右半蓝的 64x32 图，裁右半
    let mut image = RgbImage::new(64, 32);
    for (x, _, pixel) in image.enumerate_pixels_mut() {
      *pixel = if x < 32 {
        image::Rgb([255, 0, 0])
      } else {
        image::Rgb([0, 0, 255])
      };
    }
    let pixel_box = PixelBox {
      x1: 32,
      y1: 0,
      x2: 63,
      y2: 31,
    };
    let bytes = crop_encode(&image, &pixel_box).unwrap();
    let decoded: RgbImage = image::load_from_memory(&bytes).unwrap().into();
    assert_eq!(decoded.dimensions(), (31, 31));
    // JPEG 有损，只检查主导分量
    let pixel = decoded.get_pixel(15, 15).0;
    assert!(pixel[2] > 128 && pixel[0] < 128);
  }

  #[test]
  fn out_of_bounds_is_rejected() {
    let image = RgbImage::new(32, 32);
    let pixel_box = PixelBox {
      x1: 8,
      y1: 8,
      x2: 32,
      y2: 16,
    };
    assert!(matches!(
      crop_encode(&image, &pixel_box),
      Err(CropError::OutOfBounds { .. })
    ));
  }

  #[test]
  fn degenerate_box_is_rejected() {
    let image = RgbImage::new(32, 32);
    let pixel_box = PixelBox {
      x1: 8,
      y1: 8,
      x2: 8,
      y2: 16,
    };
    assert!(matches!(
      crop_encode(&image, &pixel_box),
      Err(CropError::OutOfBounds { .. })
    ));
  }
}
