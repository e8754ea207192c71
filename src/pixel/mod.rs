//! # 像素与编解码模块（pixel）
//!
//! ## 设计思路
//!
//! 流水线所有阶段都以 `PixelBuffer` 为交换单位，以 `EncodedImage` 为线上单位。
//!
//! - `buffer`：像素缓冲、通道布局与 Alpha 约定
//! - `convert`：布局与 Alpha 约定之间的显式转换
//! - `codec`：PNG 编码、带签名与尺寸校验的解码
//! - `resize`：参考图上传前的等比降采样

mod buffer;
pub mod codec;
mod convert;
pub mod resize;

pub use buffer::{AlphaConvention, PixelBuffer, PixelLayout};
pub use codec::{DecodeLimits, EncodedFormat, EncodedImage, decode, decode_with_limits, encode};
