// THEORY (1D Pixel Heuristics):
// The `Pixel` module is the most fundamental unit of the signal watcher. It is a
// "dumb" data container for a single RGB pixel plus the single-pixel heuristics the
// colour classifier needs: hue, HSV saturation and HSV value. Nothing here looks at
// neighbours in space or time.
//
// Two encodings of HSV live side by side:
// - the continuous one (hue in degrees [0, 360), saturation and value in [0, 1]),
//   computed from normalized sRGB channels, and
// - the packed 8-bit one (`Hsv`), where hue is halved to fit a byte (0..=179) and
//   saturation/value are scaled to 0..=255. The colour bands used for signal
//   detection are written in this packed encoding, so every comparison against a
//   band goes through `Pixel::to_hsv`.
//
// Key principles:
// 1) Single-pixel scope: heuristics never read neighbours or history.
// 2) No linearization: signal bands were tuned on gamma-encoded camera output.

pub mod pixel {
    pub type Channel = u8;
    pub type NormalizedChannel = f32;
    pub type Hue = f32;
    pub type SaturationHSV = f32;
    pub type ValueHSV = f32;
    pub type Chroma = f32;

    /// Largest packed hue value; 360 degrees halved, exclusive.
    pub const PACKED_HUE_LIMIT: u8 = 180;

    /// A "dumb" data container representing a single RGB pixel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Pixel {
        /// The red channel value (0-255).
        pub red: Channel,
        /// The green channel value (0-255).
        pub green: Channel,
        /// The blue channel value (0-255).
        pub blue: Channel,
    }

    /// Packed 8-bit HSV triple.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Hsv {
        /// Hue in half-degrees (0-179).
        pub hue: u8,
        /// Saturation (0-255).
        pub saturation: u8,
        /// Value (0-255).
        pub value: u8,
    }

    impl Hsv {
        pub const fn new(hue: u8, saturation: u8, value: u8) -> Self {
            Self {
                hue,
                saturation,
                value,
            }
        }
    }

    impl From<image::Rgb<u8>> for Pixel {
        fn from(rgb: image::Rgb<u8>) -> Self {
            let [red, green, blue] = rgb.0;
            Pixel::new(red, green, blue)
        }
    }

    impl From<Pixel> for image::Rgb<u8> {
        fn from(pixel: Pixel) -> Self {
            image::Rgb([pixel.red, pixel.green, pixel.blue])
        }
    }

    impl Pixel {
        pub const fn new(red: Channel, green: Channel, blue: Channel) -> Self {
            Pixel { red, green, blue }
        }

        #[inline]
        fn normalized(&self) -> (NormalizedChannel, NormalizedChannel, NormalizedChannel) {
            (
                self.red as NormalizedChannel / 255.0,
                self.green as NormalizedChannel / 255.0,
                self.blue as NormalizedChannel / 255.0,
            )
        }

        /// =================================Heuristics==================================

        /// Hue angle in degrees [0, 360).
        ///
        /// - Uses normalized sRGB channels, no linearization.
        /// - Achromatic pixels (zero chroma) report a hue of 0.
        pub fn hue(&self) -> Hue {
            let (red, green, blue) = self.normalized();
            let maximum_channel = red.max(green.max(blue));
            let minimum_channel = red.min(green.min(blue));
            let chroma = maximum_channel - minimum_channel;

            if chroma <= 1e-6 {
                return 0.0;
            }

            let inverse_chroma = 1.0 / chroma;

            let (base_difference, sector_offset) = if maximum_channel == red {
                (green - blue, 0.0)
            } else if maximum_channel == green {
                (blue - red, 2.0)
            } else {
                (red - green, 4.0)
            };

            let mut hue_degrees = (base_difference * inverse_chroma + sector_offset) * 60.0;
            if hue_degrees < 0.0 {
                hue_degrees += 360.0;
            }
            hue_degrees
        }

        /// Chroma (C): color purity = max(R,G,B) - min(R,G,B), normalized.
        pub fn chroma(&self) -> Chroma {
            let (red, green, blue) = self.normalized();
            red.max(green.max(blue)) - red.min(green.min(blue))
        }

        /// HSV Value (V): brightness defined as max(R, G, B), normalized.
        pub fn value_hsv(&self) -> ValueHSV {
            let (red, green, blue) = self.normalized();
            red.max(green.max(blue))
        }

        /// Saturation (HSV): S = chroma / value.
        /// - Black has no defined saturation and reports 0.
        pub fn saturation_hsv(&self) -> SaturationHSV {
            let value = self.value_hsv();
            if value <= 1e-6 {
                return 0.0;
            }
            self.chroma() / value
        }

        /// Packs the continuous HSV heuristics into the 8-bit encoding used by
        /// the colour bands.
        pub fn to_hsv(&self) -> Hsv {
            let mut hue = (self.hue() / 2.0).round() as u16;
            if hue >= PACKED_HUE_LIMIT as u16 {
                hue = 0;
            }
            let saturation = (self.saturation_hsv() * 255.0).round().clamp(0.0, 255.0) as u8;
            let value = self.red.max(self.green.max(self.blue));
            Hsv {
                hue: hue as u8,
                saturation,
                value,
            }
        }
    }

}
