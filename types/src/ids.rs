use std::fmt;

/// Declares a transparent identifier newtype with the usual accessors.
macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident($repr:ty), $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            Default,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name($repr);

        impl $name {
            #[must_use]
            pub const fn new(id: $repr) -> Self {
                Self(id)
            }

            #[must_use]
            pub const fn value(self) -> $repr {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

id_newtype!(
    /// Local index of a UE inside the CU-CP or DU.
    UeIndex(u32),
    "ue="
);

id_newtype!(
    /// RAN-side NGAP UE identifier, allocated locally.
    RanUeId(u64),
    "ran_ue="
);

id_newtype!(
    /// AMF-side NGAP UE identifier, assigned by the core network.
    AmfUeId(u64),
    "amf_ue="
);

id_newtype!(
    /// Correlation identifier embedded in an outgoing request.
    ///
    /// Allocated by a correlator and never reused for the lifetime of the
    /// entity that owns it.
    TransactionId(u64),
    "tid="
);

id_newtype!(PduSessionId(u8), "psi=");

id_newtype!(DrbId(u8), "drb");

id_newtype!(
    /// Logical channel identifier.
    Lcid(u8),
    "lcid="
);

impl Lcid {
    /// First LCID usable by a data radio bearer.
    pub const MIN_DRB: Lcid = Lcid(4);
    pub const MAX_DRB: Lcid = Lcid(32);

    #[must_use]
    pub const fn is_srb(self) -> bool {
        self.0 < Self::MIN_DRB.0
    }
}

/// Signalling radio bearer identifier (SRB0..SRB3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum SrbId {
    Srb0,
    Srb1,
    Srb2,
    Srb3,
}

impl SrbId {
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            SrbId::Srb0 => 0,
            SrbId::Srb1 => 1,
            SrbId::Srb2 => 2,
            SrbId::Srb3 => 3,
        }
    }

    /// SRBs map one-to-one onto the low LCIDs.
    #[must_use]
    pub const fn lcid(self) -> Lcid {
        Lcid(self.as_u8())
    }
}

impl fmt::Display for SrbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "srb{}", self.as_u8())
    }
}

/// The pair of NGAP identifiers that names a UE on the N2 interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct UeNgapIds {
    pub ran_ue_id: RanUeId,
    /// Absent until the AMF assigned one.
    pub amf_ue_id: Option<AmfUeId>,
}

impl fmt::Display for UeNgapIds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.amf_ue_id {
            Some(amf) => write!(f, "{} {amf}", self.ran_ue_id),
            None => write!(f, "{} amf_ue=?", self.ran_ue_id),
        }
    }
}
