// 该文件是 Guobang （过磅） 项目的一部分。
// src/source.rs - 图像来源（文件 / base64 负载）
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::FromUrl;

#[derive(Error, Debug)]
pub enum SourceError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("图像解码错误: {0}")]
  ImageLoad(#[from] image::ImageError),
  #[cfg(feature = "base64_input")]
  #[error("base64 负载解码错误: {0}")]
  Base64(#[from] base64::DecodeError),
  #[error("data URL 格式错误")]
  MalformedDataUrl,
  #[error("图像尺寸为零: {width}x{height}")]
  ZeroDimensions { width: u32, height: u32 },
}

/// 一次检测请求的图像来源。
///
/// 磅房上位机通过 IPC 传来的既可能是磁盘路径，也可能是
/// CCTV 抓拍的内嵌 base64 负载，两者统一在这里解码。
pub enum ImagePayload {
  /// 图像文件路径
  #[cfg(feature = "file_input")]
  Path(std::path::PathBuf),
  /// base64 编码的图像字节流
  #[cfg(feature = "base64_input")]
  Base64(String),
  /// 已就绪的图像字节流
  Bytes(Vec<u8>),
}

#[cfg(feature = "file_input")]
const FILE_SCHEME: &str = "image";
#[cfg(feature = "base64_input")]
const DATA_SCHEME: &str = "data";

impl FromUrl for ImagePayload {
  type Error = SourceError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      #[cfg(feature = "file_input")]
      FILE_SCHEME => Ok(ImagePayload::Path(url.path().into())),
      #[cfg(feature = "base64_input")]
      // RFC 2397: data:image/jpeg;base64,<payload>
      DATA_SCHEME => {
        let path = urlencoding::decode(url.path())
          .map_err(|_| SourceError::MalformedDataUrl)?
          .into_owned();
        let (meta, payload) = path.split_once(',').ok_or(SourceError::MalformedDataUrl)?;
        if !meta.ends_with(";base64") {
          return Err(SourceError::MalformedDataUrl);
        }
        Ok(ImagePayload::Base64(payload.to_string()))
      }
      other => {
        error!("不支持的图像来源方案: {}", other);
        Err(SourceError::SchemeMismatch(other.to_string()))
      }
    }
  }
}

impl ImagePayload {
  /// 解码为 RGB 像素数据，并校验尺寸非零
  pub fn decode(&self) -> Result<RgbImage, SourceError> {
    let image = match self {
      #[cfg(feature = "file_input")]
      ImagePayload::Path(path) => {
        debug!("从文件读取图像: {}", path.display());
        image::ImageReader::open(path)?.decode()?
      }
      #[cfg(feature = "base64_input")]
      ImagePayload::Base64(payload) => {
        use base64::Engine;
        let bytes = base64::engine::general_purpose::STANDARD.decode(payload.trim())?;
        debug!("解码 base64 负载: {} 字节", bytes.len());
        image::load_from_memory(&bytes)?
      }
      ImagePayload::Bytes(bytes) => image::load_from_memory(bytes)?,
    };

    let image: RgbImage = image.into();
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
      return Err(SourceError::ZeroDimensions { width, height });
    }
    debug!("图像解码完成: {}x{}", width, height);
    Ok(image)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[cfg(feature = "base64_input")]
  #[test]
  fn base64_payload_round_trip() {
    use base64::Engine;

    // 2x2 纯色图编码为 PNG 再走 base64 负载路径
    let mut image = RgbImage::new(2, 2);
    for pixel in image.pixels_mut() {
      *pixel = image::Rgb([255, 0, 0]);
    }
    let mut encoded = Vec::new();
    image
      .write_to(
        &mut std::io::Cursor::new(&mut encoded),
        image::ImageFormat::Png,
      )
      .unwrap();

    let payload =
      ImagePayload::Base64(base64::engine::general_purpose::STANDARD.encode(&encoded));
    let decoded = payload.decode().unwrap();
    assert_eq!(decoded.dimensions(), (2, 2));
    assert_eq!(decoded.get_pixel(0, 0).0, [255, 0, 0]);
  }

  #[cfg(feature = "base64_input")]
  #[test]
  fn rejects_garbage_base64() {
    let payload = ImagePayload::Base64("@@@not-base64@@@".to_string());
    assert!(payload.decode().is_err());
  }

  #[test]
  fn rejects_garbage_bytes() {
    let payload = ImagePayload::Bytes(vec![0u8; 16]);
    assert!(matches!(payload.decode(), Err(SourceError::ImageLoad(_))));
  }

  #[cfg(feature = "file_input")]
  #[test]
  fn file_scheme_from_url() {
    let url = Url::parse("image:///tmp/capture.jpg").unwrap();
    let payload = ImagePayload::from_url(&url).unwrap();
    assert!(matches!(payload, ImagePayload::Path(p) if p.ends_with("capture.jpg")));
  }

  #[cfg(feature = "base64_input")]
  #[test]
  fn data_scheme_from_url() {
    let url = Url::parse("data:image/png;base64,AAAA").unwrap();
    let payload = ImagePayload::from_url(&url).unwrap();
    assert!(matches!(payload, ImagePayload::Base64(p) if p == "AAAA"));
  }

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = Url::parse("ftp://host/file.jpg").unwrap();
    assert!(matches!(
      ImagePayload::from_url(&url),
      Err(SourceError::SchemeMismatch(_))
    ));
  }
}
