use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ratings {
    pub overall: u8,
    pub professionalism: u8,
    pub attitude: u8,
    pub punctuality: u8,
    pub quality: u8,
}

impl Ratings {
    /// Name of the first rating outside 1..=5.
    pub fn out_of_range(&self) -> Option<&'static str> {
        [
            ("overall", self.overall),
            ("professionalism", self.professionalism),
            ("attitude", self.attitude),
            ("punctuality", self.punctuality),
            ("quality", self.quality),
        ]
        .into_iter()
        .find(|(_, value)| !(1..=5).contains(value))
        .map(|(name, _)| name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewSubmission {
    #[serde(flatten)]
    pub ratings: Ratings,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub appointment_id: String,
    #[serde(flatten)]
    pub ratings: Ratings,
    pub comment: Option<String>,
    pub created_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_names_field() {
        let mut ratings = Ratings {
            overall: 5,
            professionalism: 4,
            attitude: 5,
            punctuality: 3,
            quality: 4,
        };
        assert_eq!(ratings.out_of_range(), None);

        ratings.punctuality = 0;
        assert_eq!(ratings.out_of_range(), Some("punctuality"));

        ratings.overall = 6;
        assert_eq!(ratings.out_of_range(), Some("overall"));
    }

    #[test]
    fn test_submission_flattens_ratings() {
        let json = r#"{"overall":5,"professionalism":5,"attitude":4,"punctuality":5,"quality":4,"comment":"Kind and careful"}"#;
        let submission: ReviewSubmission = serde_json::from_str(json).unwrap();
        assert_eq!(submission.ratings.attitude, 4);
        assert_eq!(submission.comment.as_deref(), Some("Kind and careful"));
    }
}
