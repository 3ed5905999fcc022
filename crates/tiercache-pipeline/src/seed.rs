//! Curated canonical records shipped with the crate, plus loading of a
//! replacement seed file.

use std::fs;
use std::path::Path;

use tiercache_core::error::{Error, Result};

use crate::canonical::CanonicalRecord;

/// Read a JSON array of canonical records.
pub fn load_seed_file(path: &Path) -> Result<Vec<CanonicalRecord>> {
    let content = fs::read_to_string(path).map_err(|e| Error::data(path, e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| Error::data(path, e.to_string()))
}

pub fn default_records() -> Vec<CanonicalRecord> {
    SEEDS.iter().map(|(question, answer, category, keywords)| CanonicalRecord::new(*question, *answer, *category, keywords.iter().copied())).collect()
}

type Seed = (&'static str, &'static str, &'static str, &'static [&'static str]);

const SEEDS: &[Seed] = &[
    (
        "What are the phases of the moon?",
        "The moon moves through eight phases in roughly 29.5 days: new moon, waxing crescent, first quarter, waxing gibbous, full moon, waning gibbous, third quarter and waning crescent. The waxing half is traditionally used for building and beginning, the waning half for release and rest.",
        "lunar_basics",
        &["phases", "moon phases", "lunar cycle", "new moon", "full moon"],
    ),
    (
        "How long does each moon phase last?",
        "A full lunar cycle takes about 29.5 days, so each of the eight phases spans roughly three to four days. The exact new, full and quarter moments are instants; the named phases describe the days around them.",
        "lunar_basics",
        &["duration", "how long", "days", "length"],
    ),
    (
        "What is the dark moon?",
        "The dark moon is the short stretch, usually one to three days, when the moon is not visible at all just before the new moon. Many practitioners treat it as a time for rest, reflection and shadow work rather than for starting new projects.",
        "lunar_basics",
        &["dark moon", "void", "shadow work"],
    ),
    (
        "How does the full moon affect emotions?",
        "Many people report feeling more intense, restless or sensitive around the full moon. In lunar practice it is treated as a time when feelings surface and become easier to notice, which makes it useful for journaling and honest reflection.",
        "emotional_effects",
        &["full moon", "emotions", "feelings", "mood"],
    ),
    (
        "When should I manifest during moon phases?",
        "Set intentions at the new moon, take action while the moon waxes, celebrate or review results at the full moon, and release what no longer serves you while it wanes. Matching the kind of work to the phase is the core of lunar timing.",
        "manifestation",
        &["manifest", "manifestation", "intentions", "goals"],
    ),
    (
        "What is a moon ritual?",
        "A moon ritual is a small intentional practice timed to a lunar phase, such as writing intentions at the new moon or a gratitude and release practice at the full moon. It usually combines a quiet space, a clear intention and a simple symbolic action.",
        "practices",
        &["ritual", "ceremony", "practice", "moon ritual"],
    ),
    (
        "What is moon water?",
        "Moon water is water left out overnight under the moon, most often the full moon, so that it can be used afterwards in rituals, for cleansing, or for watering plants. Use a clean glass container, set an intention, and bring it in before direct sunlight reaches it.",
        "practices",
        &["moon water", "lunar water", "blessed water"],
    ),
    (
        "What crystals work best with moon energy?",
        "Moonstone, selenite, labradorite and clear quartz are the stones most often paired with lunar work. Moonstone is associated with intuition and cycles, selenite with clarity and cleansing, and clear quartz is used to amplify intentions.",
        "crystals",
        &["crystals", "stones", "moonstone", "selenite"],
    ),
    (
        "How do I charge crystals in moonlight?",
        "Place your crystals on a windowsill or outside where moonlight reaches them, ideally on the night of the full moon, and collect them the next morning. Keep water-sensitive stones such as selenite dry and bring sun-sensitive stones in before sunrise.",
        "crystals",
        &["charge crystals", "moonlight", "crystal charging", "cleanse"],
    ),
    (
        "How does the moon affect sleep?",
        "Several studies have found slightly shorter and lighter sleep in the nights leading up to the full moon. If you sleep poorly around then, a darker room and a calmer evening routine help more than anything else.",
        "physical_effects",
        &["sleep", "insomnia", "dreams", "restless"],
    ),
    (
        "How do moon phases affect plants and gardening?",
        "Traditional lunar gardening sows leafy crops while the moon waxes, root crops while it wanes, and rests the soil around the dark moon. The practice is old and widespread; treat it as a planning rhythm alongside weather and soil conditions.",
        "nature_connection",
        &["plants", "gardening", "garden", "growing"],
    ),
    (
        "What do moon signs mean?",
        "Your moon sign is the zodiac sign the moon occupied when you were born. In astrology it describes emotional needs and instinctive reactions, complementing the sun sign, which describes conscious identity.",
        "astrology",
        &["moon sign", "astrology", "zodiac", "signs"],
    ),
    (
        "What is a blue moon?",
        "A blue moon is either the second full moon within a single calendar month or the third full moon in an astronomical season that has four. It happens roughly every two to three years, and the moon does not actually look blue.",
        "special_events",
        &["blue moon", "rare", "twice"],
    ),
    (
        "How do I track moon phases?",
        "Use a lunar calendar or almanac and keep a simple moon journal noting the phase, your mood, energy and sleep each day. After two or three cycles patterns become visible and you can plan around them.",
        "practices",
        &["track", "lunar calendar", "moon journal", "cycle"],
    ),
    (
        "How do I create a lunar altar?",
        "Choose a small clear surface, add something white or silver, a candle, a bowl of water and a crystal such as moonstone, and change one element with each phase. The altar is a focus point; keep it simple enough to tend regularly.",
        "practices",
        &["altar", "sacred space", "lunar altar"],
    ),
    (
        "What is a blood moon?",
        "A blood moon is a total lunar eclipse: the earth's shadow covers the moon and sunlight bent through our atmosphere turns it a deep red. It is safe to watch with the naked eye and is traditionally seen as a time of endings and transformation.",
        "special_events",
        &["blood moon", "red moon", "eclipse"],
    ),
];
