/// Canonical city with the lowercase phrases that imply it.
///
/// `landmarks` only ever point at this city and outrank city names.
/// `weak_landmarks` are shared or ambiguous terms consulted after city names.
#[derive(Debug, Clone, Copy)]
pub struct CityPatterns {
    pub city: &'static str,
    pub country: &'static str,
    pub names: &'static [&'static str],
    pub landmarks: &'static [&'static str],
    pub weak_landmarks: &'static [&'static str],
}

pub static CITY_TABLE: &[CityPatterns] = &[
    CityPatterns {
        city: "London",
        country: "United Kingdom",
        names: &["london"],
        landmarks: &[
            "stonehenge",
            "windsor",
            "harry potter",
            "warner bros",
            "tower of london",
            "buckingham",
            "westminster",
            "big ben",
            "london eye",
            "greenwich",
            "cotswolds",
            "oxford",
            "cambridge",
            "canterbury",
            "seven sisters",
            "leeds castle",
            "stratford-upon-avon",
        ],
        weak_landmarks: &["bath", "thames", "brighton", "dover"],
    },
    CityPatterns {
        city: "Madrid",
        country: "Spain",
        names: &["madrid"],
        landmarks: &[
            "segovia",
            "toledo",
            "guadarrama",
            "ávila",
            "avila",
            "el escorial",
            "escorial",
            "valley of the fallen",
            "cuelgamuros",
            "aranjuez",
            "chinchón",
            "chinchon",
            "prado",
            "retiro",
            "bernabéu",
            "bernabeu",
            "salamanca",
            "cuenca",
        ],
        weak_landmarks: &["alcázar", "alcazar"],
    },
    CityPatterns {
        city: "Barcelona",
        country: "Spain",
        names: &["barcelona"],
        landmarks: &[
            "sagrada familia",
            "sagrada família",
            "park güell",
            "park guell",
            "montserrat",
            "camp nou",
            "casa batlló",
            "casa batllo",
            "la pedrera",
            "girona",
            "sitges",
            "figueres",
            "costa brava",
        ],
        weak_landmarks: &["gothic quarter"],
    },
    CityPatterns {
        city: "Seville",
        country: "Spain",
        names: &["seville", "sevilla"],
        landmarks: &[
            "real alcázar",
            "real alcazar",
            "plaza de españa",
            "plaza de espana",
            "triana",
        ],
        weak_landmarks: &["ronda"],
    },
    CityPatterns {
        city: "Paris",
        country: "France",
        names: &["paris"],
        landmarks: &[
            "eiffel",
            "louvre",
            "versailles",
            "montmartre",
            "notre-dame",
            "notre dame",
            "giverny",
            "mont saint-michel",
            "mont-saint-michel",
            "disneyland paris",
        ],
        weak_landmarks: &["seine", "champagne"],
    },
    CityPatterns {
        city: "Rome",
        country: "Italy",
        names: &["rome", "roma"],
        landmarks: &[
            "colosseum",
            "colosseo",
            "vatican",
            "sistine",
            "trevi",
            "roman forum",
            "palatine",
            "tivoli",
        ],
        weak_landmarks: &["pantheon", "pompeii"],
    },
    CityPatterns {
        city: "Lisbon",
        country: "Portugal",
        names: &["lisbon", "lisboa"],
        landmarks: &[
            "sintra",
            "belém",
            "belem",
            "cascais",
            "alfama",
            "óbidos",
            "obidos",
            "arrábida",
            "arrabida",
        ],
        weak_landmarks: &["fátima", "fatima"],
    },
    CityPatterns {
        city: "Amsterdam",
        country: "Netherlands",
        names: &["amsterdam"],
        landmarks: &[
            "zaanse schans",
            "keukenhof",
            "volendam",
            "anne frank",
            "rijksmuseum",
            "van gogh museum",
            "giethoorn",
        ],
        weak_landmarks: &["marken"],
    },
    CityPatterns {
        city: "Dublin",
        country: "Ireland",
        names: &["dublin"],
        landmarks: &[
            "guinness storehouse",
            "howth",
            "glendalough",
            "wicklow",
            "cliffs of moher",
        ],
        weak_landmarks: &["giant's causeway"],
    },
    CityPatterns {
        city: "Edinburgh",
        country: "United Kingdom",
        names: &["edinburgh"],
        landmarks: &["loch ness", "st andrews", "stirling"],
        weak_landmarks: &["highlands"],
    },
];
