//! Built-in reference data: the development user, the specialty catalogue and the
//! resource library. Loaded into `MemoryStore::seeded`.

use crate::store::{NewSpecialty, Resource, ResourceDetails, ResourceKind, User, UserId};

/// There is no authentication; every request acts as this user.
pub const MOCK_USER_ID: UserId = 1;

pub fn mock_user() -> User {
  User { id: MOCK_USER_ID, name: "Dr. Jane Smith".into(), role: "Medical Student, Year 5".into() }
}

fn specialty(name: &str, description: &str, count: i64, colour: &str, mastery: i64) -> NewSpecialty {
  let (color_class, bg_class, text_class) = if colour == "primary" {
    ("bg-primary".to_string(), "bg-primary bg-opacity-10".to_string(), "text-primary".to_string())
  } else {
    (format!("bg-{colour}-500"), format!("bg-{colour}-100"), format!("text-{colour}-700"))
  };
  NewSpecialty {
    name: name.into(),
    description: description.into(),
    question_count: count,
    color_class,
    bg_class,
    text_class,
    mastery_percentage: mastery,
  }
}

pub fn seed_specialties() -> Vec<NewSpecialty> {
  vec![
    specialty("Cardiology", "Heart failure, arrhythmias, ischemic heart disease, and valvular disorders.", 85, "primary", 70),
    specialty("Respiratory", "Asthma, COPD, pneumonia, pulmonary embolism, and respiratory failure.", 64, "emerald", 55),
    specialty("Neurology", "Stroke, seizures, dementia, headache, and neurodegenerative disorders.", 78, "red", 35),
    specialty("Gastroenterology", "IBD, liver disease, pancreatitis, and GI bleeding disorders.", 52, "amber", 60),
    specialty("Endocrinology", "Diabetes, thyroid disorders, adrenal disease, and pituitary disorders.", 45, "purple", 65),
    specialty(
      "Nephrology",
      "Acute kidney injury, chronic kidney disease, glomerulonephritis, and electrolyte disorders.",
      38,
      "blue",
      40,
    ),
  ]
}

fn resource(kind: ResourceKind, title: &str, description: &str, url: &str, tags: &[&str], details: ResourceDetails) -> Resource {
  Resource {
    id: 0,
    kind,
    title: title.into(),
    description: description.into(),
    url: url.into(),
    details,
    tags: tags.iter().map(|t| t.to_string()).collect(),
  }
}

fn guideline(title: &str, description: &str, url: &str, organization: &str, tags: &[&str]) -> Resource {
  let details = ResourceDetails { organization: Some(organization.into()), ..Default::default() };
  resource(ResourceKind::Guideline, title, description, url, tags, details)
}

fn question_bank(
  title: &str,
  description: &str,
  url: &str,
  platform: &str,
  free: bool,
  question_count: i64,
  tags: &[&str],
) -> Resource {
  let details = ResourceDetails {
    platform: Some(platform.into()),
    free: Some(free),
    has_demo: Some(true),
    demo_url: Some(format!("{}/{}", url, if platform == "General Medical Council" { "practice" } else { "demo" })),
    question_count: Some(question_count),
    ..Default::default()
  };
  resource(ResourceKind::Questionbank, title, description, url, tags, details)
}

fn ukmla_doc(title: &str, description: &str, url: &str, date: &str, tags: &[&str]) -> Resource {
  let details = ResourceDetails {
    publisher: Some("General Medical Council".into()),
    date: Some(date.into()),
    ..Default::default()
  };
  resource(ResourceKind::Ukmla, title, description, url, tags, details)
}

pub fn seed_resources() -> Vec<Resource> {
  vec![
    guideline(
      "Acute Coronary Syndromes Management",
      "Comprehensive guidelines for the management of acute coronary syndromes, including STEMI, NSTEMI, and unstable angina.",
      "https://www.nice.org.uk/guidance/cg94",
      "NICE Guidelines",
      &["Cardiology", "Emergency Medicine", "STEMI", "NSTEMI"],
    ),
    guideline(
      "Stroke and TIA Management",
      "Guidelines for diagnosis and management of stroke and transient ischemic attacks, including primary and secondary prevention.",
      "https://www.nice.org.uk/guidance/ng128",
      "NICE Guidelines",
      &["Neurology", "Stroke", "TIA", "Prevention"],
    ),
    guideline(
      "Asthma Diagnosis and Management",
      "Latest evidence-based approach to diagnosing, monitoring and managing asthma in adults, children and young people.",
      "https://www.nice.org.uk/guidance/ng80",
      "British Thoracic Society",
      &["Respiratory", "Asthma", "Inhalers", "Exacerbations"],
    ),
    guideline(
      "Diabetes in Pregnancy",
      "Management of diabetes and its complications from pre-conception to the postnatal period.",
      "https://www.nice.org.uk/guidance/ng3",
      "NICE Guidelines",
      &["Endocrinology", "Obstetrics", "Diabetes", "Pregnancy"],
    ),
    guideline(
      "IBD Management Guidelines",
      "Diagnosis and management of ulcerative colitis and Crohn's disease in adults, children and young people.",
      "https://www.nice.org.uk/guidance/ng129",
      "British Society of Gastroenterology",
      &["Gastroenterology", "IBD", "Crohn's", "Ulcerative Colitis"],
    ),
    guideline(
      "Chronic Kidney Disease Management",
      "Early identification and management of chronic kidney disease in adults in primary and secondary care.",
      "https://www.nice.org.uk/guidance/cg182",
      "NICE Guidelines",
      &["Nephrology", "CKD", "Renal", "Dialysis"],
    ),
    question_bank(
      "PassMedicine",
      "Extensive question bank specifically designed for medical school finals and the UK Medical Licensing Assessment.",
      "https://www.passmedicine.com",
      "PassMedicine",
      false,
      3500,
      &["UKMLA", "Finals", "SBAs", "EMQs"],
    ),
    question_bank(
      "UKMLA Question Bank",
      "Official question bank with practice questions in the exact format of the UKMLA examination.",
      "https://www.gmc-uk.org/education/ukmla",
      "General Medical Council",
      true,
      1000,
      &["UKMLA", "Applied Knowledge Test", "Official"],
    ),
    question_bank(
      "Pastest UKMLA",
      "High-quality questions with detailed explanations, covering all aspects of the UKMLA curriculum.",
      "https://www.pastest.com/ukmla",
      "Pastest",
      false,
      2800,
      &["UKMLA", "Medical Finals", "Clinical Skills"],
    ),
    ukmla_doc(
      "UKMLA Content Map",
      "Detailed breakdown of knowledge areas and learning outcomes covered in the UKMLA examination.",
      "https://www.gmc-uk.org/education/ukmla/content-map",
      "2023-10-15",
      &["UKMLA", "Curriculum", "Learning Outcomes"],
    ),
    ukmla_doc(
      "UKMLA Implementation Timeline",
      "Official timeline for the phased implementation of the UK Medical Licensing Assessment.",
      "https://www.gmc-uk.org/education/ukmla/timeline",
      "2023-09-01",
      &["UKMLA", "Implementation", "Timeline"],
    ),
    ukmla_doc(
      "Applied Knowledge Test Format",
      "Explanation of the format, question types, and scoring system for the AKT component of the UKMLA.",
      "https://www.gmc-uk.org/education/ukmla/akt-format",
      "2023-11-20",
      &["UKMLA", "AKT", "Assessment Format"],
    ),
    ukmla_doc(
      "Clinical and Professional Skills Assessment Guide",
      "Comprehensive guide to the CPSA component, including station types, marking criteria, and preparation advice.",
      "https://www.gmc-uk.org/education/ukmla/cpsa-guide",
      "2023-12-05",
      &["UKMLA", "CPSA", "Clinical Skills", "OSCE"],
    ),
  ]
}
