// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;

/// A four-character code: box types, brands, handler and item types.
#[derive(Default, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct FourCC {
    pub value: [u8; 4],
}

impl From<u32> for FourCC {
    fn from(number: u32) -> Self {
        Self { value: number.to_be_bytes() }
    }
}

impl From<[u8; 4]> for FourCC {
    fn from(value: [u8; 4]) -> Self {
        Self { value }
    }
}

impl From<BoxType> for FourCC {
    fn from(t: BoxType) -> Self {
        let box_num: u32 = Into::into(t);
        From::from(box_num)
    }
}

impl PartialEq<&[u8; 4]> for FourCC {
    fn eq(&self, other: &&[u8; 4]) -> bool {
        self.value == **other
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{self}'")
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.value {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

macro_rules! box_database {
    ($($(#[$attr:meta])* $boxenum:ident $boxtype:literal),*,) => {
        #[derive(Clone, Copy, PartialEq, Eq)]
        pub enum BoxType {
            $($(#[$attr])* $boxenum),*,
            UnknownBox(u32),
        }

        impl From<u32> for BoxType {
            fn from(t: u32) -> Self {
                use self::BoxType::*;
                match t {
                    $($boxtype => $boxenum),*,
                    _ => UnknownBox(t),
                }
            }
        }

        impl From<BoxType> for u32 {
            fn from(b: BoxType) -> u32 {
                use self::BoxType::*;
                match b {
                    $($boxenum => $boxtype),*,
                    UnknownBox(t) => t,
                }
            }
        }

        impl fmt::Debug for BoxType {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let fourcc: FourCC = From::from(*self);
                fmt::Debug::fmt(&fourcc, f)
            }
        }
    }
}

box_database!(
    FileTypeBox                       0x6674_7970, // "ftyp"
    SegmentTypeBox                    0x7374_7970, // "styp"
    MetadataBox                       0x6d65_7461, // "meta"
    MovieBox                          0x6d6f_6f76, // "moov"
    MovieHeaderBox                    0x6d76_6864, // "mvhd"
    TrackBox                          0x7472_616b, // "trak"
    EditBox                           0x6564_7473, // "edts"
    MediaBox                          0x6d64_6961, // "mdia"
    MediaInformationBox               0x6d69_6e66, // "minf"
    DataInformationBox                0x6469_6e66, // "dinf"
    SampleTableBox                    0x7374_626c, // "stbl"
    MediaDataBox                      0x6d64_6174, // "mdat"
    FreeSpaceBox                      0x6672_6565, // "free"
    SkipBox                           0x736b_6970, // "skip"
    WideBox                           0x7769_6465, // "wide"
    HandlerBox                        0x6864_6c72, // "hdlr"
    PrimaryItemBox                    0x7069_746d, // "pitm"
    ItemInfoBox                       0x6969_6e66, // "iinf"
    ItemInfoEntry                     0x696e_6665, // "infe"
    ItemLocationBox                   0x696c_6f63, // "iloc"
    ImageReferenceBox                 0x6972_6566, // "iref"
    ItemDataBox                       0x6964_6174, // "idat"
    ImagePropertiesBox                0x6970_7270, // "iprp"
    ItemPropertyContainerBox          0x6970_636f, // "ipco"
    ItemPropertyAssociationBox        0x6970_6d61, // "ipma"
    ImageSpatialExtentsBox            0x6973_7065, // "ispe"
    PixelInformationBox               0x7069_7869, // "pixi"
    ColourInformationBox              0x636f_6c72, // "colr"
    CleanApertureBox                  0x636c_6170, // "clap"
    AV1CodecConfigurationBox          0x6176_3143, // "av1C"
    HEVCConfigurationBox              0x6876_6343, // "hvcC"
    UuidBox                           0x7575_6964, // "uuid"
    MotionPhotoVideoBox               0x6d70_7664, // "mpvd"
    MP4VisualSampleEntry              0x6d70_3476, // "mp4v"
);

/// Where the children of a container box begin within its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChildLayout {
    /// Children start at the first payload byte.
    Plain,
    /// Children follow the 4-byte version/flags of a full box.
    FullBox,
    /// Children follow version/flags and a 16-bit (v0) or 32-bit entry count.
    ItemInfo,
}

impl BoxType {
    /// Container boxes whose payload is (partly) a nested box sequence.
    pub(crate) const fn child_layout(self) -> Option<ChildLayout> {
        use self::BoxType::*;
        match self {
            MovieBox | TrackBox | EditBox | MediaBox | MediaInformationBox | DataInformationBox
            | SampleTableBox | ImagePropertiesBox | ItemPropertyContainerBox => Some(ChildLayout::Plain),
            MetadataBox => Some(ChildLayout::FullBox),
            ItemInfoBox => Some(ChildLayout::ItemInfo),
            _ => None,
        }
    }

    /// Box types accepted as the first box of an ISOBMFF file.
    pub(crate) const fn is_top_level_signature(self) -> bool {
        use self::BoxType::*;
        matches!(
            self,
            FileTypeBox | SegmentTypeBox | MovieBox | MediaDataBox | FreeSpaceBox | SkipBox | WideBox | MetadataBox
        )
    }
}

#[test]
fn fourcc_round_trips_box_type() {
    let ftyp = BoxType::from(0x6674_7970);
    assert_eq!(ftyp, BoxType::FileTypeBox);
    assert!(FourCC::from(ftyp) == b"ftyp");
    assert_eq!(FourCC::from(ftyp).to_string(), "ftyp");

    let unknown = BoxType::from(u32::from_be_bytes(*b"zzzz"));
    assert_eq!(unknown, BoxType::UnknownBox(0x7a7a_7a7a));
    assert_eq!(format!("{unknown:?}"), "'zzzz'");
}

#[test]
fn fourcc_display_escapes_binary() {
    let odd = FourCC::from([b'a', 0, b'c', 0xff]);
    assert_eq!(odd.to_string(), "a\\x00c\\xff");
}
