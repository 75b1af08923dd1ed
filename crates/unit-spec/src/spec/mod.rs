pub mod block;
pub mod button;
pub mod container;
pub mod path;
pub mod questionnaire;
pub mod unit;

pub use block::{
    Accordion, Audio, Block, BlockKind, Card, CardSide, DoneCriteria, Flashcard, Html, Label,
    LabeledImage, Process, Tabs, Video, YouTube,
};
pub use button::{Button, ButtonGroup};
pub use container::Container;
pub use path::{Path, PathContainer};
pub use questionnaire::{
    InteractionComponent, InteractionType, PassCriteria, Question, QuestionDefinition,
    QuestionFeedback, Questionnaire, QuestionnaireFeedback,
};
pub use unit::{Activity, ActivityDefinition, Image, ImageCredit, LanguageMap, Unit};
