//! Closed sum types for the columns that the store tolerates as plain TEXT.
//!
//! Per the "enumerations" design note: stringly-typed storage is fine for
//! forward compatibility, but every read validates at the boundary through
//! `FromStr`. Unknown values fall back to an `Other(String)` variant instead
//! of failing, so historical and hand-edited rows stay readable.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

macro_rules! closed_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $tag:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
            /// Stringly-typed fallback for forward-compatible/unrecognized values.
            Other(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$variant => $tag,)+
                    Self::Other(s) => s.as_str(),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(match s {
                    $($tag => Self::$variant,)+
                    other => Self::Other(other.to_string()),
                })
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_str(&s).map_err(|_| D::Error::custom("unreachable: infallible"))
            }
        }
    };
}

closed_enum!(
    /// §6.3
    SenderIntent {
        Human1to1 => "human_1to1",
        ColdOutreach => "cold_outreach",
        NurtureSequence => "nurture_sequence",
        Newsletter => "newsletter",
        Transactional => "transactional",
        Promotional => "promotional",
        EventInvitation => "event_invitation",
        PartnershipPitch => "partnership_pitch",
        ReEngagement => "re_engagement",
        Procurement => "procurement",
        Recruiting => "recruiting",
        Community => "community",
    }
);

closed_enum!(
    /// §6.3. `VendorUpsell` is tolerated on historical rows but must never
    /// be emitted by the detector (§4.7.4).
    GemType {
        DormantWarmThread => "dormant_warm_thread",
        UnansweredAsk => "unanswered_ask",
        WeakMarketingLead => "weak_marketing_lead",
        PartnerProgram => "partner_program",
        RenewalLeverage => "renewal_leverage",
        DistributionChannel => "distribution_channel",
        CoMarketing => "co_marketing",
        IndustryIntel => "industry_intel",
        ProcurementSignal => "procurement_signal",
        VendorUpsell => "vendor_upsell",
    }
);

closed_enum!(
    /// §4.7.3
    RelationshipType {
        MyVendor => "my_vendor",
        MyServiceProvider => "my_service_provider",
        MyInfrastructure => "my_infrastructure",
        Institutional => "institutional",
        InboundProspect => "inbound_prospect",
        WarmContact => "warm_contact",
        PotentialPartner => "potential_partner",
        SellingToMe => "selling_to_me",
        Community => "community",
        Unknown => "unknown",
    }
);

closed_enum!(
    AwaitingResponseFrom {
        User => "user",
        OtherParty => "other",
        None => "none",
    }
);

closed_enum!(
    GemStatus { New => "new", Acted => "acted", Dismissed => "dismissed" }
);

closed_enum!(
    DraftStatus {
        Draft => "draft",
        Approved => "approved",
        Sent => "sent",
        Replied => "replied",
    }
);

closed_enum!(
    RunStatus {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
    }
);

closed_enum!(
    TriggeredBy { Web => "web", Cli => "cli" }
);

closed_enum!(
    OverrideScope { Message => "message", Sender => "sender" }
);

closed_enum!(
    EntitySource { Spacy => "spacy", Regex => "regex", Header => "header" }
);

closed_enum!(
    EntityType {
        Person => "person",
        Organization => "organization",
        Money => "money",
        Date => "date",
        Role => "role",
        Phone => "phone",
        Url => "url",
        ProcurementSignal => "procurement_signal",
    }
);

closed_enum!(
    CompanySize { Small => "small", Medium => "medium", Enterprise => "enterprise" }
);

closed_enum!(
    EspConfidence { High => "high", Medium => "medium", Low => "low" }
);

closed_enum!(
    EstimatedValue {
        Low => "low",
        Medium => "medium",
        MediumHigh => "medium-high",
        High => "high",
    }
);

closed_enum!(
    Urgency { Low => "low", Medium => "medium", High => "high" }
);

closed_enum!(
    /// §4.8 economic segments
    EconomicSegment {
        SpendMap => "spend_map",
        PartnerMap => "partner_map",
        ProspectMap => "prospect_map",
        DormantThreads => "dormant_threads",
        DistributionMap => "distribution_map",
        ProcurementMap => "procurement_map",
    }
);

closed_enum!(
    /// §4.9 strategy routing
    Strategy {
        Audit => "audit",
        Revival => "revival",
        Partner => "partner",
        RenewalNegotiation => "renewal_negotiation",
        IndustryReport => "industry_report",
        Mirror => "mirror",
        DistributionPitch => "distribution_pitch",
    }
);

closed_enum!(
    Channel { Email => "email" }
);

closed_enum!(
    /// Person-entity relationship classification (§4.5)
    ContactRelationship {
        DecisionMaker => "decision_maker",
        Automated => "automated",
        VendorContact => "vendor_contact",
        Peer => "peer",
    }
);

closed_enum!(
    /// Pipeline stage tags (§4.10 registry)
    Stage {
        Metadata => "metadata",
        Content => "content",
        Entities => "entities",
        Classify => "classify",
        Profile => "profile",
        Segment => "segment",
        Engage => "engage",
    }
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_known_tag() {
        assert_eq!(GemType::from_str("renewal_leverage").unwrap().as_str(), "renewal_leverage");
    }

    #[test]
    fn tolerates_legacy_vendor_upsell() {
        let g = GemType::from_str("vendor_upsell").unwrap();
        assert_eq!(g, GemType::VendorUpsell);
    }

    #[test]
    fn unknown_value_falls_back_to_other() {
        let g = GemType::from_str("something_new").unwrap();
        match g {
            GemType::Other(s) => assert_eq!(s, "something_new"),
            _ => panic!("expected Other fallback"),
        }
    }
}
