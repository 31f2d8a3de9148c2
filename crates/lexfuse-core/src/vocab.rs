//! Fixed value vocabularies for the canonical graph.
//!
//! These are closed pools; the builder never reads anything from outside the
//! process, so two runs with the same seed draw identical values.

pub const INDUSTRIES: [&str; 15] = [
    "Automotive",
    "Healthcare",
    "Finance",
    "Retail",
    "Technology",
    "Manufacturing",
    "Energy",
    "Real Estate",
    "Telecommunications",
    "Aerospace",
    "Pharmaceuticals",
    "Banking",
    "Insurance",
    "Construction",
    "Transportation",
];

pub const PRACTICE_AREAS: [&str; 10] = [
    "IP",
    "Employment",
    "Contracts",
    "Regulatory",
    "M&A",
    "Litigation",
    "Corporate",
    "Tax",
    "Immigration",
    "Environmental",
];

pub const ATTORNEYS: [&str; 10] = [
    "Daniel Park",
    "Mark Thompson",
    "Hannah Lee",
    "Ayesha Khan",
    "Lina Gomez",
    "James Wilson",
    "Sarah Chen",
    "Michael Brown",
    "Emily Davis",
    "Robert Taylor",
];

pub const COMPANY_TEMPLATES: [&str; 6] = [
    "{industry} Solutions Inc",
    "{industry} Group LLC",
    "{industry} Holdings Corp",
    "{industry} Partners",
    "{industry} International",
    "{industry} Systems",
];

pub const MATTER_TITLE_TEMPLATES: [&str; 4] = [
    "{client} - Master Services Agreement Negotiation",
    "{client} - Regulatory Inquiry",
    "{client} v. ACME Corp - Employment Dispute",
    "{client} - Contract Breach",
];

pub const WORK_DESCRIPTIONS: [&str; 8] = [
    "Reviewed contract",
    "Drafted motion",
    "Prepared discovery",
    "Client call",
    "Document review",
    "Research",
    "Court appearance",
    "Negotiation",
];

pub const DOC_TYPES: [&str; 5] = ["Contract", "Agreement", "Motion", "Brief", "Correspondence"];

pub const FILE_TYPES: [&str; 3] = ["pdf", "docx", "txt"];

pub const BILLING_RATES: [u64; 3] = [250, 300, 375];
