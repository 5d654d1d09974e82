//! Medical vocabulary: a static dictionary plus ordered heuristic rules.
//!
//! `classify` is a pure function so the rules can be tested without rendering.

use serde::Serialize;

/// Citation attached to definitions synthesized by a heuristic rule.
pub const HEURISTIC_CITATION: &str =
    "General medical terminology (definition derived from word structure)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TermSource {
    Dictionary,
    Suffix,
    Prefix,
    Acronym,
    Anatomical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermInfo {
    /// Lowercased identifier of the term.
    pub key: String,
    pub definition: String,
    pub citation: String,
    pub source: TermSource,
}

struct DictionaryEntry {
    term: &'static str,
    definition: &'static str,
    citation: &'static str,
}

const DICTIONARY: &[DictionaryEntry] = &[
    DictionaryEntry {
        term: "hallux valgus",
        definition: "Lateral deviation of the great toe at the first metatarsophalangeal joint with medial prominence of the first metatarsal head.",
        citation: "Nix S, Smith M, Vicenzino B. Prevalence of hallux valgus in the general population: a systematic review and meta-analysis. J Foot Ankle Res. 2010;3:21.",
    },
    DictionaryEntry {
        term: "fractura",
        definition: "Loss of continuity of a bone, complete or incomplete.",
        citation: "Court-Brown CM, Caesar B. Epidemiology of adult fractures: a review. Injury. 2006;37(8):691-697.",
    },
    DictionaryEntry {
        term: "fractura de radio distal",
        definition: "Fracture of the distal metaphysis of the radius, usually after a fall on the outstretched hand.",
        citation: "Nellans KW, Kowalski E, Chung KC. The epidemiology of distal radius fractures. Hand Clin. 2012;28(2):113-125.",
    },
    DictionaryEntry {
        term: "artrosis",
        definition: "Degenerative joint disease with progressive loss of articular cartilage and subchondral bone remodelling.",
        citation: "Hunter DJ, Bierma-Zeinstra S. Osteoarthritis. Lancet. 2019;393(10182):1745-1759.",
    },
    DictionaryEntry {
        term: "osteoporosis",
        definition: "Systemic skeletal disease with low bone mass and microarchitectural deterioration that increases fracture risk.",
        citation: "Compston JE, McClung MR, Leslie WD. Osteoporosis. Lancet. 2019;393(10169):364-376.",
    },
    DictionaryEntry {
        term: "esguince",
        definition: "Partial or complete tear of a ligament caused by forced joint movement beyond its normal range.",
        citation: "Doherty C, Delahunt E, Caulfield B, et al. The incidence and prevalence of ankle sprain injury. Sports Med. 2014;44(1):123-140.",
    },
    DictionaryEntry {
        term: "luxación",
        definition: "Complete loss of contact between the articular surfaces of a joint.",
        citation: "Kroner K, Lind T, Jensen J. The epidemiology of shoulder dislocations. Arch Orthop Trauma Surg. 1989;108(5):288-290.",
    },
    DictionaryEntry {
        term: "menisco",
        definition: "Fibrocartilaginous crescent of the knee that distributes load and stabilises the joint.",
        citation: "Fox AJS, Bedi A, Rodeo SA. The basic science of human knee menisci. Sports Health. 2012;4(4):340-351.",
    },
    DictionaryEntry {
        term: "ligamento cruzado anterior",
        definition: "Intra-articular knee ligament that restrains anterior tibial translation and rotation.",
        citation: "Kaeding CC, Léger-St-Jean B, Magnussen RA. Epidemiology and diagnosis of anterior cruciate ligament injuries. Clin Sports Med. 2017;36(1):1-8.",
    },
    DictionaryEntry {
        term: "escoliosis",
        definition: "Three-dimensional deformity of the spine with a lateral curvature greater than 10 degrees.",
        citation: "Weinstein SL, Dolan LA, Cheng JC, et al. Adolescent idiopathic scoliosis. Lancet. 2008;371(9623):1527-1537.",
    },
    DictionaryEntry {
        term: "lumbalgia",
        definition: "Pain located between the costal margin and the inferior gluteal folds.",
        citation: "Hartvigsen J, Hancock MJ, Kongsted A, et al. What low back pain is and why we need to pay attention. Lancet. 2018;391(10137):2356-2367.",
    },
    DictionaryEntry {
        term: "síndrome del túnel carpiano",
        definition: "Compression neuropathy of the median nerve at the wrist.",
        citation: "Padua L, Coraci D, Erra C, et al. Carpal tunnel syndrome: clinical features, diagnosis, and management. Lancet Neurol. 2016;15(12):1273-1284.",
    },
    DictionaryEntry {
        term: "epicondilitis",
        definition: "Tendinopathy of the common extensor origin at the lateral epicondyle of the humerus.",
        citation: "Shiri R, Viikari-Juntura E, Varonen H, Heliövaara M. Prevalence and determinants of lateral and medial epicondylitis. Am J Epidemiol. 2006;164(11):1065-1074.",
    },
    DictionaryEntry {
        term: "fascitis plantar",
        definition: "Degenerative irritation of the plantar fascia at its calcaneal insertion.",
        citation: "Buchbinder R. Plantar fasciitis. N Engl J Med. 2004;350(21):2159-2166.",
    },
    DictionaryEntry {
        term: "manguito rotador",
        definition: "Group of four shoulder muscles and tendons that stabilise the glenohumeral joint.",
        citation: "Tashjian RZ. Epidemiology, natural history, and indications for treatment of rotator cuff tears. Clin Sports Med. 2012;31(4):589-604.",
    },
    DictionaryEntry {
        term: "osteomielitis",
        definition: "Infection of bone, usually bacterial, with progressive inflammatory destruction.",
        citation: "Lew DP, Waldvogel FA. Osteomyelitis. Lancet. 2004;364(9431):369-379.",
    },
    DictionaryEntry {
        term: "tendinitis",
        definition: "Painful tendon disorder, today mostly understood as a degenerative tendinopathy.",
        citation: "Riley G. Tendinopathy: from basic science to treatment. Nat Clin Pract Rheumatol. 2008;4(2):82-89.",
    },
    DictionaryEntry {
        term: "artroplastia",
        definition: "Surgical replacement or reconstruction of a joint surface.",
        citation: "Learmonth ID, Young C, Rorabeck C. The operation of the century: total hip replacement. Lancet. 2007;370(9597):1508-1519.",
    },
];

/// Heuristic rules, applied in order after the dictionary.
enum Rule {
    /// Word ends with the affix; the template receives the stem.
    Suffix(&'static str, &'static str),
    /// Word starts with the affix; the template receives the whole word.
    Prefix(&'static str, &'static str),
    /// Word starts with an anatomical stem.
    Anatomical(&'static str),
}

const RULES: &[Rule] = &[
    Rule::Suffix("itis", "Inflammation of {}"),
    Rule::Suffix("osis", "Degenerative or pathological condition of {}"),
    Rule::Suffix("algia", "Pain in {}"),
    Rule::Suffix("ectomía", "Surgical removal of {}"),
    Rule::Suffix("ectomia", "Surgical removal of {}"),
    Rule::Suffix("ectomy", "Surgical removal of {}"),
    Rule::Suffix("plastia", "Surgical repair of {}"),
    Rule::Suffix("plasty", "Surgical repair of {}"),
    Rule::Suffix("otomía", "Surgical incision of {}"),
    Rule::Suffix("otomia", "Surgical incision of {}"),
    Rule::Suffix("otomy", "Surgical incision of {}"),
    Rule::Suffix("patía", "Disease of {}"),
    Rule::Suffix("patia", "Disease of {}"),
    Rule::Suffix("pathy", "Disease of {}"),
    Rule::Suffix("desis", "Surgical fusion of {}"),
    Rule::Suffix("penia", "Deficiency of {}"),
    Rule::Prefix("artro", "Term related to the joints: {}"),
    Rule::Prefix("arthro", "Term related to the joints: {}"),
    Rule::Prefix("osteo", "Term related to bone: {}"),
    Rule::Prefix("condro", "Term related to cartilage: {}"),
    Rule::Prefix("chondro", "Term related to cartilage: {}"),
    Rule::Prefix("neuro", "Term related to the nervous system: {}"),
    Rule::Prefix("mio", "Term related to muscle: {}"),
    Rule::Prefix("myo", "Term related to muscle: {}"),
    Rule::Prefix("hemato", "Term related to blood: {}"),
    Rule::Anatomical("cervic"),
    Rule::Anatomical("lumb"),
    Rule::Anatomical("torác"),
    Rule::Anatomical("torac"),
    Rule::Anatomical("thorac"),
    Rule::Anatomical("femor"),
    Rule::Anatomical("tibi"),
    Rule::Anatomical("humer"),
    Rule::Anatomical("clavic"),
    Rule::Anatomical("escapul"),
    Rule::Anatomical("scapul"),
    Rule::Anatomical("patel"),
    Rule::Anatomical("rotul"),
    Rule::Anatomical("calcane"),
    Rule::Anatomical("vertebr"),
];

/// Acronyms recognised as medical terms, with their expansion.
const ACRONYMS: &[(&str, &str)] = &[
    ("ACL", "Anterior cruciate ligament"),
    ("LCA", "Ligamento cruzado anterior (anterior cruciate ligament)"),
    ("MRI", "Magnetic resonance imaging"),
    ("RM", "Resonancia magnética (magnetic resonance imaging)"),
    ("CT", "Computed tomography"),
    ("TC", "Tomografía computarizada (computed tomography)"),
    ("NSAID", "Non-steroidal anti-inflammatory drug"),
    ("AINE", "Antiinflamatorio no esteroideo (NSAID)"),
    ("ORIF", "Open reduction and internal fixation"),
    ("ROM", "Range of motion"),
    ("EMG", "Electromyography"),
    ("DEXA", "Dual-energy X-ray absorptiometry"),
    ("TVP", "Trombosis venosa profunda (deep vein thrombosis)"),
    ("DVT", "Deep vein thrombosis"),
];

/// A heuristic match must be at least this many characters longer than its affix.
const MIN_EXTRA_CHARS: usize = 2;

/// Dictionary phrases, for scanning multi-word terms.
pub fn dictionary_terms() -> impl Iterator<Item = &'static str> {
    DICTIONARY.iter().map(|e| e.term)
}

/// Looks a phrase up in the dictionary, case-insensitively.
pub fn lookup(phrase: &str) -> Option<TermInfo> {
    let key = phrase.trim().to_lowercase();
    DICTIONARY.iter().find(|e| e.term == key).map(|e| TermInfo {
        key,
        definition: e.definition.to_string(),
        citation: e.citation.to_string(),
        source: TermSource::Dictionary,
    })
}

/// Classifies a single word: dictionary first, then acronyms, then the ordered rules.
pub fn classify(word: &str) -> Option<TermInfo> {
    if let Some(info) = lookup(word) {
        return Some(info);
    }

    let word = word.trim();
    if let Some(info) = classify_acronym(word) {
        return Some(info);
    }

    let lower = word.to_lowercase();
    let len = lower.chars().count();

    RULES.iter().find_map(|rule| {
        let (affix, definition) = match rule {
            Rule::Suffix(suffix, template) => {
                let stem = lower.strip_suffix(*suffix)?;
                (*suffix, template.replace("{}", stem))
            }
            Rule::Prefix(prefix, template) => {
                lower.strip_prefix(*prefix)?;
                (*prefix, template.replace("{}", &lower))
            }
            Rule::Anatomical(stem) => {
                lower.strip_prefix(*stem)?;
                (*stem, format!("Anatomical region: {}", lower))
            }
        };
        if len < affix.chars().count() + MIN_EXTRA_CHARS {
            return None;
        }
        Some(TermInfo {
            key: lower.clone(),
            definition,
            citation: HEURISTIC_CITATION.to_string(),
            source: match rule {
                Rule::Suffix(..) => TermSource::Suffix,
                Rule::Prefix(..) => TermSource::Prefix,
                Rule::Anatomical(..) => TermSource::Anatomical,
            },
        })
    })
}

fn classify_acronym(word: &str) -> Option<TermInfo> {
    let len = word.chars().count();
    if !(2..=5).contains(&len) || !word.chars().all(|c| c.is_ascii_uppercase()) {
        return None;
    }
    ACRONYMS
        .iter()
        .find(|(acronym, _)| *acronym == word)
        .map(|(acronym, expansion)| TermInfo {
            key: acronym.to_lowercase(),
            definition: format!("Medical acronym: {}", expansion),
            citation: HEURISTIC_CITATION.to_string(),
            source: TermSource::Acronym,
        })
}

/// "hallux valgus" -> "Hallux Valgus".
pub fn title_case(term: &str) -> String {
    term.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dictionary_wins_over_heuristics() {
        let info = classify("Tendinitis").unwrap();
        assert_eq!(info.source, TermSource::Dictionary);
        assert_eq!(info.key, "tendinitis");
        assert!(info.citation.contains("Riley G"));
    }

    #[test]
    fn suffix_rule_synthesizes_definition() {
        let info = classify("bursitis").unwrap();
        assert_eq!(info.source, TermSource::Suffix);
        assert_eq!(info.definition, "Inflammation of burs");
        assert_eq!(info.citation, HEURISTIC_CITATION);
    }

    #[test]
    fn short_words_do_not_match_affixes() {
        // "dosis" is only one character longer than "osis".
        assert!(classify("dosis").is_none());
        // "mio" + 1 character.
        assert!(classify("mios").is_none());
        assert!(classify("miocardio").is_some());
    }

    #[test]
    fn prefix_and_anatomical_rules() {
        assert_eq!(classify("osteotomía").unwrap().source, TermSource::Suffix);
        assert_eq!(classify("neuropático").unwrap().source, TermSource::Prefix);
        let femoral = classify("femoral").unwrap();
        assert_eq!(femoral.source, TermSource::Anatomical);
        assert_eq!(femoral.definition, "Anatomical region: femoral");
    }

    #[test]
    fn acronyms_must_be_uppercase_and_whitelisted() {
        let info = classify("ACL").unwrap();
        assert_eq!(info.source, TermSource::Acronym);
        assert_eq!(info.key, "acl");
        assert!(classify("acl").is_none());
        assert!(classify("USA").is_none());
    }

    #[test]
    fn ordinary_words_are_not_terms() {
        for word in ["paciente", "presenta", "tambien", "recurrente", "valgus", "El"] {
            assert!(classify(word).is_none(), "{} classified", word);
        }
    }

    #[test]
    fn title_cases_each_word() {
        assert_eq!(title_case("hallux valgus"), "Hallux Valgus");
        assert_eq!(title_case("luxación"), "Luxación");
    }
}
