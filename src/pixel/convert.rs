//! # 通道与 Alpha 约定转换
//!
//! 每个转换都声明源约定与目标约定：
//!
//! | 函数 | 源 | 目标 |
//! |------|----|------|
//! | `into_rgba` | Rgb/None | Rgba/Straight（A=255） |
//! | `into_straight` | Rgba/Premultiplied | Rgba/Straight |
//! | `into_premultiplied` | Rgba/Straight | Rgba/Premultiplied |
//! | `narrow_u16` | 16 位分量 | 8 位分量（截断右移） |
//!
//! 所有整数运算均为截断，保证往返结果逐位可复现。

use super::{AlphaConvention, PixelBuffer, PixelLayout};

impl PixelBuffer {
    /// Rgb/None → Rgba/Straight。缺失的 Alpha 一律视为 255，RGB 字节不变。
    ///
    /// 已是 RGBA 的缓冲原样返回。
    pub fn into_rgba(self) -> PixelBuffer {
        match self.layout {
            PixelLayout::Rgba => self,
            PixelLayout::Rgb => {
                let mut data = Vec::with_capacity(self.data.len() / 3 * 4);
                for px in self.data.chunks_exact(3) {
                    data.extend_from_slice(px);
                    data.push(u8::MAX);
                }

                PixelBuffer {
                    width: self.width,
                    height: self.height,
                    layout: PixelLayout::Rgba,
                    alpha: AlphaConvention::Straight,
                    data,
                }
            }
        }
    }

    /// Rgba/Premultiplied → Rgba/Straight。其他约定原样返回。
    pub fn into_straight(mut self) -> PixelBuffer {
        if self.alpha != AlphaConvention::Premultiplied {
            return self;
        }

        for px in self.data.chunks_exact_mut(4) {
            let a = px[3];
            px[0] = unpremultiply_channel(px[0], a);
            px[1] = unpremultiply_channel(px[1], a);
            px[2] = unpremultiply_channel(px[2], a);
        }
        self.alpha = AlphaConvention::Straight;
        self
    }

    /// Rgba/Straight → Rgba/Premultiplied。其他约定原样返回。
    pub fn into_premultiplied(mut self) -> PixelBuffer {
        if self.alpha != AlphaConvention::Straight {
            return self;
        }

        for px in self.data.chunks_exact_mut(4) {
            let a = px[3];
            px[0] = premultiply_channel(px[0], a);
            px[1] = premultiply_channel(px[1], a);
            px[2] = premultiply_channel(px[2], a);
        }
        self.alpha = AlphaConvention::Premultiplied;
        self
    }

    /// 任意输入 → Rgba/Straight，即宿主新图层要求的格式。
    pub fn into_straight_rgba(self) -> PixelBuffer {
        self.into_straight().into_rgba()
    }
}

/// `c * a / 255`，截断。
pub(crate) fn premultiply_channel(c: u8, a: u8) -> u8 {
    (u16::from(c) * u16::from(a) / 255) as u8
}

/// `c * 255 / a`，截断并钳制到 255；`a == 0` 时结果为 0。
pub(crate) fn unpremultiply_channel(c: u8, a: u8) -> u8 {
    if a == 0 {
        return 0;
    }
    (u32::from(c) * 255 / u32::from(a)).min(255) as u8
}

/// 16 位分量 → 8 位：截断右移 8 位。
pub(crate) fn narrow_u16(value: u16) -> u8 {
    (value >> 8) as u8
}

/// 浮点分量先映射到 16 位中间表示，再按 `narrow_u16` 截断。
pub(crate) fn narrow_f32(value: f32) -> u8 {
    let wide = (value.clamp(0.0, 1.0) * f32::from(u16::MAX)) as u16;
    narrow_u16(wide)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_expands_with_opaque_alpha() {
        let rgb = PixelBuffer::rgb(2, 1, vec![10, 20, 30, 40, 50, 60]).expect("rgb");
        let rgba = rgb.into_rgba();

        assert_eq!(rgba.layout(), PixelLayout::Rgba);
        assert_eq!(rgba.alpha(), AlphaConvention::Straight);
        assert_eq!(rgba.as_bytes(), &[10, 20, 30, 255, 40, 50, 60, 255]);
    }

    #[test]
    fn premultiply_truncates() {
        assert_eq!(premultiply_channel(255, 128), 128);
        assert_eq!(premultiply_channel(100, 128), 50);
        assert_eq!(premultiply_channel(1, 254), 0);
        assert_eq!(premultiply_channel(200, 0), 0);
        assert_eq!(premultiply_channel(200, 255), 200);
    }

    #[test]
    fn unpremultiply_truncates_and_clamps() {
        assert_eq!(unpremultiply_channel(50, 128), 99);
        assert_eq!(unpremultiply_channel(128, 128), 255);
        assert_eq!(unpremultiply_channel(200, 100), 255);
        assert_eq!(unpremultiply_channel(77, 0), 0);
    }

    #[test]
    fn straight_conversion_round_trips_for_opaque_pixels() {
        let straight = PixelBuffer::rgba(1, 2, vec![1, 2, 3, 255, 200, 100, 50, 255]).expect("rgba");
        let back = straight.clone().into_premultiplied().into_straight();
        assert_eq!(back, straight);
    }

    #[test]
    fn premultiplied_converts_to_straight() {
        let pre = PixelBuffer::new(
            1,
            1,
            PixelLayout::Rgba,
            AlphaConvention::Premultiplied,
            vec![64, 32, 0, 128],
        )
        .expect("premultiplied");

        let straight = pre.into_straight();
        assert_eq!(straight.alpha(), AlphaConvention::Straight);
        assert_eq!(straight.as_bytes(), &[127, 63, 0, 128]);
    }

    #[test]
    fn narrowing_uses_truncating_shift() {
        assert_eq!(narrow_u16(0xFFFF), 0xFF);
        assert_eq!(narrow_u16(0x80FF), 0x80);
        assert_eq!(narrow_u16(0x00FF), 0x00);
        assert_eq!(narrow_f32(1.0), 255);
        assert_eq!(narrow_f32(0.0), 0);
        assert_eq!(narrow_f32(-3.0), 0);
    }
}
